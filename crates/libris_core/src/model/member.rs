//! Library member record.
//!
//! # Invariants
//! - `phone` matches `^[6-9][0-9]{9}$`.
//! - `registration_date` is set once by the directory.

use super::validation::{require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static MOBILE_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[6-9][0-9]{9}$").expect("valid phone regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Numeric member identifier; assigned from 1 upward.
pub type MemberId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Unix epoch milliseconds.
    pub registration_date: i64,
}

/// Registration input for a new member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl NewMember {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Returns a trimmed copy, or the first validation failure.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let name = require_text("name", &self.name)?;
        let email = require_text("email", &self.email)?;
        if !EMAIL_RE.is_match(&email) {
            return Err(ValidationError::InvalidEmail(email));
        }
        let phone = self.phone.trim().to_string();
        validate_phone(&phone)?;
        Ok(Self { name, email, phone })
    }
}

/// Checks the 10-digit mobile pattern (leading digit 6-9).
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if MOBILE_PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone(phone.to_string()))
    }
}
