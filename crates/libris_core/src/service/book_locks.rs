//! Per-book coordination locks.

use crate::model::book::BookId;
use crate::store::mutex_guard;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lazily created mutex per catalogued book id.
///
/// The outer map is locked only long enough to fetch, create or drop a slot,
/// so holding one book's lock never blocks work on another book. Callers
/// only ask for slots of books they have seen in the catalog and drop the
/// slot when the book is removed.
#[derive(Debug, Default)]
pub(crate) struct BookLocks {
    slots: Mutex<HashMap<BookId, Arc<Mutex<()>>>>,
}

impl BookLocks {
    pub(crate) fn slot(&self, book_id: BookId) -> Arc<Mutex<()>> {
        mutex_guard(&self.slots)
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the slot for a removed book; holders of the old `Arc` keep it.
    pub(crate) fn forget(&self, book_id: BookId) {
        mutex_guard(&self.slots).remove(&book_id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        mutex_guard(&self.slots).len()
    }
}

#[cfg(test)]
mod tests {
    use super::BookLocks;
    use std::sync::Arc;

    #[test]
    fn same_book_shares_a_slot() {
        let locks = BookLocks::default();
        assert!(Arc::ptr_eq(&locks.slot(101), &locks.slot(101)));
        assert!(!Arc::ptr_eq(&locks.slot(101), &locks.slot(102)));
    }

    #[test]
    fn forget_drops_only_that_slot() {
        let locks = BookLocks::default();
        let held = locks.slot(101);
        locks.slot(102);

        locks.forget(101);
        assert_eq!(locks.len(), 1);
        assert!(!Arc::ptr_eq(&held, &locks.slot(101)));
    }
}
