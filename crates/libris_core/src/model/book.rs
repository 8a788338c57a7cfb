//! Book title and copy accounting record.
//!
//! # Invariants
//! - `id` is assigned by the catalog and never changes.
//! - `available_copies <= total_copies`.
//! - `times_issued` never decreases.

use super::validation::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

/// Numeric catalog identifier; the catalog hands these out from 101 upward.
pub type BookId = u32;

/// One catalogued title with its copy counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub category: String,
    /// All copies owned by the library.
    pub total_copies: u32,
    /// Copies on the shelf right now (may still be held for a reservation).
    pub available_copies: u32,
    pub times_issued: u64,
}

impl Book {
    /// Copies currently out on loan.
    pub fn copies_on_loan(&self) -> u32 {
        self.total_copies.saturating_sub(self.available_copies)
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// Registration input for a new title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub category: String,
    pub total_copies: u32,
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
        total_copies: u32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            category: category.into(),
            total_copies,
        }
    }

    /// Returns a trimmed copy, or the first validation failure.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let title = require_text("title", &self.title)?;
        let author = require_text("author", &self.author)?;
        let category = require_text("category", &self.category)?;
        if self.total_copies < 1 {
            return Err(ValidationError::InvalidCopyCount(self.total_copies));
        }
        Ok(Self {
            title,
            author,
            category,
            total_copies: self.total_copies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Book, NewBook};
    use crate::model::validation::{ValidationError, MAX_TEXT_CHARS};

    #[test]
    fn normalized_trims_fields() {
        let book = NewBook::new("  Clean Code ", "Robert C. Martin", " Tech", 3)
            .normalized()
            .expect("valid book");
        assert_eq!(book.title, "Clean Code");
        assert_eq!(book.category, "Tech");
    }

    #[test]
    fn normalized_rejects_blank_and_zero_copies() {
        let err = NewBook::new("   ", "a", "b", 1).normalized().unwrap_err();
        assert_eq!(err, ValidationError::BlankField("title"));

        let err = NewBook::new("t", "a", "b", 0).normalized().unwrap_err();
        assert_eq!(err, ValidationError::InvalidCopyCount(0));
    }

    #[test]
    fn normalized_rejects_overlong_author() {
        let author = "x".repeat(MAX_TEXT_CHARS + 1);
        let err = NewBook::new("t", author, "c", 1).normalized().unwrap_err();
        assert_eq!(
            err,
            ValidationError::FieldTooLong {
                field: "author",
                max: MAX_TEXT_CHARS
            }
        );
    }

    #[test]
    fn copies_on_loan_is_total_minus_available() {
        let book = Book {
            id: 101,
            title: "t".into(),
            author: "a".into(),
            category: "c".into(),
            total_copies: 5,
            available_copies: 2,
            times_issued: 9,
        };
        assert_eq!(book.copies_on_loan(), 3);
        assert!(book.is_available());
    }
}
