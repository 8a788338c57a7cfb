//! In-memory owning stores for circulation state.
//!
//! # Responsibility
//! - Catalog owns books, Directory owns members, CirculationLedger owns
//!   loans and ReservationQueue owns per-book wait lines.
//! - Each store guards its own state; cross-store atomicity is the engine's job.
//!
//! # Invariants
//! - Stores never call each other.
//! - Mutators marked `pub(crate)` are only reached from the engine while it
//!   holds the affected book's lock.

pub mod catalog;
pub mod directory;
pub mod ledger;
pub mod reservation_queue;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Every mutation leaves its state consistent before any point that could
// panic, so a poisoned guard still protects valid data.
pub(crate) fn read_guard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_guard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn mutex_guard<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
