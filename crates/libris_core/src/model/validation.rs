//! Input validation errors shared by registration paths.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound, in characters, for any trimmed registration text field.
pub const MAX_TEXT_CHARS: usize = 200;

/// Malformed registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trimming.
    BlankField(&'static str),
    /// Text field is longer than [`MAX_TEXT_CHARS`] after trimming.
    FieldTooLong { field: &'static str, max: usize },
    /// Book must own at least one copy.
    InvalidCopyCount(u32),
    /// Phone is not a 10-digit mobile number starting with 6-9.
    InvalidPhone(String),
    /// Email is not shaped like `local@domain.tld`.
    InvalidEmail(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::FieldTooLong { field, max } => {
                write!(f, "{field} must be at most {max} characters")
            }
            Self::InvalidCopyCount(count) => {
                write!(f, "total copies must be at least 1, got {count}")
            }
            Self::InvalidPhone(phone) => write!(
                f,
                "invalid mobile number `{phone}`: expected 10 digits starting with 6-9"
            ),
            Self::InvalidEmail(email) => write!(f, "invalid email address `{email}`"),
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects it when nothing is left or it is too long.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    check_length(field, trimmed)?;
    Ok(trimmed.to_string())
}

/// Rejects `value` when it has more than [`MAX_TEXT_CHARS`] characters.
pub(crate) fn check_length(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().nth(MAX_TEXT_CHARS).is_some() {
        return Err(ValidationError::FieldTooLong {
            field,
            max: MAX_TEXT_CHARS,
        });
    }
    Ok(())
}
