//! Member directory.
//!
//! # Responsibility
//! - Validate and register members; hand out sequential member ids.
//!
//! # Invariants
//! - Stored members always passed `NewMember::normalized()`.
//! - `registration_date` is written once, at insertion.

use super::{read_guard, write_guard};
use crate::error::{LibraryError, LibraryResult, NotFoundTarget};
use crate::model::member::{validate_phone, Member, MemberId, NewMember};
use std::collections::BTreeMap;
use std::sync::RwLock;

pub const FIRST_MEMBER_ID: MemberId = 1;

#[derive(Debug)]
struct DirectoryState {
    members: BTreeMap<MemberId, Member>,
    next_id: MemberId,
}

/// Exclusive owner of [`Member`] records.
#[derive(Debug)]
pub struct Directory {
    state: RwLock<DirectoryState>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState {
                members: BTreeMap::new(),
                next_id: FIRST_MEMBER_ID,
            }),
        }
    }

    pub(crate) fn restore(members: Vec<Member>, next_id: MemberId) -> LibraryResult<Self> {
        let mut map = BTreeMap::new();
        for member in members {
            validate_phone(&member.phone).map_err(|err| {
                LibraryError::InvalidData(format!("member {}: {err}", member.id))
            })?;
            if member.id >= next_id {
                return Err(LibraryError::InvalidData(format!(
                    "member id {} is not below next id {next_id}",
                    member.id
                )));
            }
            if map.insert(member.id, member).is_some() {
                return Err(LibraryError::InvalidData(
                    "duplicate member id in snapshot".to_string(),
                ));
            }
        }
        Ok(Self {
            state: RwLock::new(DirectoryState {
                members: map,
                next_id: next_id.max(FIRST_MEMBER_ID),
            }),
        })
    }

    /// Validates and stores a member registered at `now_ms`.
    pub fn register(&self, new_member: &NewMember, now_ms: i64) -> LibraryResult<Member> {
        let normalized = new_member.normalized()?;
        let mut state = write_guard(&self.state);
        let id = state.next_id;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| LibraryError::invariant("member id space exhausted"))?;
        let member = Member {
            id,
            name: normalized.name,
            email: normalized.email,
            phone: normalized.phone,
            registration_date: now_ms,
        };
        state.members.insert(id, member.clone());
        state.next_id = next_id;
        Ok(member)
    }

    pub fn get(&self, id: MemberId) -> LibraryResult<Member> {
        read_guard(&self.state)
            .members
            .get(&id)
            .cloned()
            .ok_or(LibraryError::NotFound(NotFoundTarget::Member(id)))
    }

    pub fn contains(&self, id: MemberId) -> bool {
        read_guard(&self.state).members.contains_key(&id)
    }

    pub fn list(&self) -> Vec<Member> {
        read_guard(&self.state).members.values().cloned().collect()
    }

    pub fn next_id(&self) -> MemberId {
        read_guard(&self.state).next_id
    }
}

#[cfg(test)]
mod tests {
    use super::{Directory, FIRST_MEMBER_ID};
    use crate::error::{LibraryError, NotFoundTarget};
    use crate::model::member::NewMember;
    use crate::model::validation::ValidationError;

    #[test]
    fn register_assigns_ids_and_registration_date() {
        let directory = Directory::new();
        let member = directory
            .register(&NewMember::new("Ravi", "ravi@example.com", "9876543210"), 1_000)
            .expect("register");
        assert_eq!(member.id, FIRST_MEMBER_ID);
        assert_eq!(member.registration_date, 1_000);
        assert_eq!(directory.get(member.id).unwrap(), member);
    }

    #[test]
    fn bad_phone_is_rejected_without_consuming_an_id() {
        let directory = Directory::new();
        let err = directory
            .register(&NewMember::new("Ravi", "ravi@example.com", "12345"), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Validation(ValidationError::InvalidPhone(_))
        ));
        assert_eq!(directory.next_id(), FIRST_MEMBER_ID);
        assert!(directory.list().is_empty());
    }

    #[test]
    fn unknown_member_is_not_found() {
        let err = Directory::new().get(9).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::NotFound(NotFoundTarget::Member(9))
        ));
    }
}
