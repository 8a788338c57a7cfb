//! Point-in-time copy of every owned record, used for persistence.

use super::book::{Book, BookId};
use super::loan::Loan;
use super::member::{Member, MemberId};
use super::reservation::ReservationEntry;
use serde::{Deserialize, Serialize};

/// Consistent cut of catalog, directory, ledger and queues.
///
/// `loans` are in issue order and `reservations` in queue order per book;
/// restoring depends on both orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub books: Vec<Book>,
    pub members: Vec<Member>,
    pub loans: Vec<Loan>,
    pub reservations: Vec<ReservationEntry>,
    pub next_book_id: BookId,
    pub next_member_id: MemberId,
}
