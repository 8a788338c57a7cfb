//! Circulation domain model.
//!
//! # Responsibility
//! - Define the records owned by catalog, directory, ledger and queue.
//! - Validate user-supplied registration input before it reaches a store.
//!
//! # Invariants
//! - Book and member ids are numeric, unique and never reused.
//! - Loans are closed, never deleted; overdue figures are always derived.

pub mod book;
pub mod loan;
pub mod member;
pub mod reservation;
pub mod snapshot;
pub mod validation;
