//! Instant book lookup.
//!
//! # Responsibility
//! - Answer case-insensitive prefix/substring/id queries without scanning the
//!   catalog.
//! - Stay consistent with the catalog through explicit upsert/remove hooks.
//!
//! # See also
//! - `service::circulation_engine` for when hooks fire.

pub mod index;
pub mod trie;
