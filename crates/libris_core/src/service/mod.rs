//! Circulation use-case layer.
//!
//! # Responsibility
//! - Orchestrate catalog, directory, queue and ledger into atomic operations.
//! - Expose the call contract consumed by boundary adapters.
//!
//! # Invariants
//! - Every mutation of a book's copies, loans or queue runs under that
//!   book's lock.

mod book_locks;
pub mod circulation_engine;
pub mod receipts;
pub mod sample_data;
