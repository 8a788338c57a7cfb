//! Circulation core for a lending library.
//! This crate is the single source of truth for copy accounting, loans and
//! reservation order.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LibraryConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::{LibraryError, LibraryResult, NotFoundTarget};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::book::{Book, BookId, NewBook};
pub use model::loan::{Loan, OverdueRecord};
pub use model::member::{Member, MemberId, NewMember};
pub use model::reservation::ReservationEntry;
pub use model::snapshot::LibrarySnapshot;
pub use model::validation::ValidationError;
pub use repo::snapshot_repo::{with_write_lock, SnapshotRepository, SqliteSnapshotRepository};
pub use search::index::{SearchHit, SearchIndex};
pub use search::trie::MatchKind;
pub use service::circulation_engine::{free_copies, CirculationEngine};
pub use service::receipts::{
    IssueReceipt, IssuedBook, MemberDetails, OverdueLine, ReserveReceipt, ReturnReceipt,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
