//! Persistence contracts and their SQLite implementations.
//!
//! # Responsibility
//! - Move whole library snapshots in and out of storage.
//! - Keep SQL inside the core persistence boundary.
//!
//! # Invariants
//! - Read paths reject invalid persisted rows with `InvalidData` instead of
//!   masking them.

pub mod snapshot_repo;
