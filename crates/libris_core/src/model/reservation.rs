//! Pending reservation entry.

use super::book::BookId;
use super::member::MemberId;
use serde::{Deserialize, Serialize};

/// A member's standing request for the next copy of one book.
///
/// Queue order, not `reserved_at`, is authoritative for fairness; two entries
/// created in the same millisecond still keep their arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEntry {
    pub book_id: BookId,
    pub member_id: MemberId,
    /// Unix epoch milliseconds.
    pub reserved_at: i64,
}
