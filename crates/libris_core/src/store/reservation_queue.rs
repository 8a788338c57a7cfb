//! Per-book FIFO reservation queues.
//!
//! # Responsibility
//! - Keep one independent wait line per book.
//! - Enforce one pending entry per (book, member) and a per-book capacity.
//!
//! # Invariants
//! - Within a book, entries keep strict arrival order; nothing reorders them.
//! - Only the head can be consumed by a claim (`dequeue_if_matches`).
//! - Cancellation removes one entry at any position and keeps the rest in order.
//!
//! The outer map is only write-locked to create a book's queue; all other
//! operations lock just the one book's queue, so different books never contend.

use super::{mutex_guard, read_guard, write_guard};
use crate::error::{LibraryError, LibraryResult};
use crate::model::book::BookId;
use crate::model::member::MemberId;
use crate::model::reservation::ReservationEntry;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

type BookQueue = Arc<Mutex<VecDeque<ReservationEntry>>>;

/// Exclusive owner of pending [`ReservationEntry`] values.
#[derive(Debug)]
pub struct ReservationQueue {
    capacity: usize,
    queues: RwLock<BTreeMap<BookId, BookQueue>>,
}

impl ReservationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queues: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rebuilds queues from persisted entries given in queue order.
    pub(crate) fn restore(capacity: usize, entries: Vec<ReservationEntry>) -> LibraryResult<Self> {
        let queue = Self::new(capacity);
        for entry in entries {
            let slot = queue.queue_or_create(entry.book_id);
            let mut line = mutex_guard(&slot);
            if line.iter().any(|e| e.member_id == entry.member_id) {
                return Err(LibraryError::InvalidData(format!(
                    "member {} reserved book {} twice",
                    entry.member_id, entry.book_id
                )));
            }
            line.push_back(entry);
        }
        Ok(queue)
    }

    /// Appends a reservation and returns its 1-based position.
    ///
    /// # Errors
    /// - `AlreadyReserved` when the member already waits for this book.
    /// - `QueueFull` when the book's line is at capacity.
    pub fn enqueue(
        &self,
        book_id: BookId,
        member_id: MemberId,
        reserved_at: i64,
    ) -> LibraryResult<usize> {
        let slot = self.queue_or_create(book_id);
        let mut line = mutex_guard(&slot);
        if line.iter().any(|entry| entry.member_id == member_id) {
            return Err(LibraryError::AlreadyReserved { book_id, member_id });
        }
        if line.len() >= self.capacity {
            return Err(LibraryError::QueueFull {
                book_id,
                capacity: self.capacity,
            });
        }
        line.push_back(ReservationEntry {
            book_id,
            member_id,
            reserved_at,
        });
        Ok(line.len())
    }

    /// Member at the head of the book's line, if any.
    pub fn peek_next(&self, book_id: BookId) -> Option<MemberId> {
        let slot = self.queue(book_id)?;
        let line = mutex_guard(&slot);
        line.front().map(|entry| entry.member_id)
    }

    /// Removes the head only when it belongs to `member_id`.
    pub fn dequeue_if_matches(&self, book_id: BookId, member_id: MemberId) -> bool {
        let Some(slot) = self.queue(book_id) else {
            return false;
        };
        let mut line = mutex_guard(&slot);
        match line.front() {
            Some(head) if head.member_id == member_id => {
                line.pop_front();
                true
            }
            _ => false,
        }
    }

    /// Withdraws the member's entry wherever it sits in the line.
    pub fn cancel(&self, book_id: BookId, member_id: MemberId) -> bool {
        let Some(slot) = self.queue(book_id) else {
            return false;
        };
        let mut line = mutex_guard(&slot);
        match line.iter().position(|entry| entry.member_id == member_id) {
            Some(index) => line.remove(index).is_some(),
            None => false,
        }
    }

    pub fn len(&self, book_id: BookId) -> usize {
        self.queue(book_id)
            .map_or(0, |slot| mutex_guard(&slot).len())
    }

    /// The head entry of the book's line, if any.
    pub(crate) fn head_entry(&self, book_id: BookId) -> Option<ReservationEntry> {
        let slot = self.queue(book_id)?;
        let line = mutex_guard(&slot);
        line.front().cloned()
    }

    pub fn list_for_book(&self, book_id: BookId) -> Vec<ReservationEntry> {
        self.queue(book_id)
            .map(|slot| mutex_guard(&slot).iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every pending entry of one member, in book id order.
    pub fn list_for_member(&self, member_id: MemberId) -> Vec<ReservationEntry> {
        self.snapshot_slots()
            .into_iter()
            .filter_map(|slot| {
                mutex_guard(&slot)
                    .iter()
                    .find(|entry| entry.member_id == member_id)
                    .cloned()
            })
            .collect()
    }

    /// Every pending entry: book id order, then queue order.
    pub fn list_all(&self) -> Vec<ReservationEntry> {
        self.snapshot_slots()
            .into_iter()
            .flat_map(|slot| mutex_guard(&slot).iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Drops the book's line; callers ensure it is empty.
    pub(crate) fn forget_book(&self, book_id: BookId) {
        write_guard(&self.queues).remove(&book_id);
    }

    fn queue(&self, book_id: BookId) -> Option<BookQueue> {
        read_guard(&self.queues).get(&book_id).cloned()
    }

    fn queue_or_create(&self, book_id: BookId) -> BookQueue {
        if let Some(slot) = self.queue(book_id) {
            return slot;
        }
        write_guard(&self.queues)
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    fn snapshot_slots(&self) -> Vec<BookQueue> {
        read_guard(&self.queues).values().cloned().collect()
    }
}
