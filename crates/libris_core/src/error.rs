//! Error taxonomy for circulation operations.
//!
//! # Responsibility
//! - Give every domain rule violation a typed, caller-visible outcome.
//! - Keep internal consistency failures distinguishable from user errors.
//!
//! # Invariants
//! - `InvariantViolation` is only produced when copy accounting or stored
//!   data would become impossible; it never describes a user mistake.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::book::BookId;
use crate::model::member::MemberId;
use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundTarget {
    Book(BookId),
    Member(MemberId),
    Reservation {
        book_id: BookId,
        member_id: MemberId,
    },
}

impl Display for NotFoundTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Book(id) => write!(f, "book not found: {id}"),
            Self::Member(id) => write!(f, "member not found: {id}"),
            Self::Reservation { book_id, member_id } => write!(
                f,
                "no pending reservation for member {member_id} on book {book_id}"
            ),
        }
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Validation(ValidationError),
    Config(ConfigError),
    NotFound(NotFoundTarget),
    /// Member already holds an active loan of this book.
    DuplicateLoan {
        book_id: BookId,
        member_id: MemberId,
    },
    AlreadyReserved {
        book_id: BookId,
        member_id: MemberId,
    },
    /// No copy may be issued to this caller right now.
    Unavailable {
        book_id: BookId,
    },
    /// Reservation refused because a copy can be issued directly.
    UnavailableForReservation {
        book_id: BookId,
        free_copies: u32,
    },
    QueueFull {
        book_id: BookId,
        capacity: usize,
    },
    NoSuchLoan {
        book_id: BookId,
        member_id: MemberId,
    },
    /// Removal refused while loans or reservations still reference the book.
    BookInUse {
        book_id: BookId,
        active_loans: usize,
        pending_reservations: usize,
    },
    /// Internal consistency failure; indicates a defect, not user error.
    InvariantViolation(String),
    Db(DbError),
    InvalidData(String),
}

impl LibraryError {
    /// Whether this error signals a defect or infrastructure fault rather than
    /// an expected, caller-recoverable outcome.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation(_) | Self::Db(_) | Self::InvalidData(_)
        )
    }

    /// Stable short code for logs and boundary adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::DuplicateLoan { .. } => "duplicate_loan",
            Self::AlreadyReserved { .. } => "already_reserved",
            Self::Unavailable { .. } => "unavailable",
            Self::UnavailableForReservation { .. } => "unavailable_for_reservation",
            Self::QueueFull { .. } => "queue_full",
            Self::NoSuchLoan { .. } => "no_such_loan",
            Self::BookInUse { .. } => "book_in_use",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Db(_) => "db",
            Self::InvalidData(_) => "invalid_data",
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::NotFound(target) => write!(f, "{target}"),
            Self::DuplicateLoan { book_id, member_id } => write!(
                f,
                "member {member_id} already holds a copy of book {book_id}"
            ),
            Self::AlreadyReserved { book_id, member_id } => write!(
                f,
                "member {member_id} already has a pending reservation for book {book_id}"
            ),
            Self::Unavailable { book_id } => {
                write!(f, "no copy of book {book_id} is available to issue")
            }
            Self::UnavailableForReservation {
                book_id,
                free_copies,
            } => write!(
                f,
                "book {book_id} has {free_copies} free copies; issue it directly"
            ),
            Self::QueueFull { book_id, capacity } => write!(
                f,
                "reservation queue for book {book_id} is full ({capacity} entries)"
            ),
            Self::NoSuchLoan { book_id, member_id } => write!(
                f,
                "member {member_id} has no active loan of book {book_id}"
            ),
            Self::BookInUse {
                book_id,
                active_loans,
                pending_reservations,
            } => write!(
                f,
                "book {book_id} is in use: {active_loans} active loans, {pending_reservations} pending reservations"
            ),
            Self::InvariantViolation(message) => write!(f, "invariant violation: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted library data: {message}"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for LibraryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConfigError> for LibraryError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for LibraryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LibraryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
