//! Result envelopes returned by circulation operations.
//!
//! Each receipt renders the human-readable status line through `Display`.

use crate::model::book::Book;
use crate::model::loan::{Loan, OverdueRecord};
use crate::model::member::{Member, MemberId};
use crate::model::reservation::ReservationEntry;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Outcome of a successful issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReceipt {
    pub loan: Loan,
    /// Book state right after the issue committed.
    pub book: Book,
    /// Whether the member claimed the copy as head of the reservation queue.
    pub from_reservation: bool,
    pub loan_period_days: u32,
}

impl Display for IssueReceipt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Book issued successfully. Due in {} days.",
            self.loan_period_days
        )?;
        if self.from_reservation {
            write!(f, " Reservation fulfilled.")?;
        }
        Ok(())
    }
}

/// Outcome of a successful return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    /// Closed loan with `return_date` set.
    pub loan: Loan,
    pub book: Book,
    /// Queue head now entitled to the freed copy, if any.
    pub held_for: Option<MemberId>,
    pub days_overdue: u64,
    pub fine: u64,
}

impl Display for ReturnReceipt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.held_for {
            Some(member_id) => write!(
                f,
                "Book returned; held for reservation (member {member_id})."
            )?,
            None => write!(f, "Book returned successfully.")?,
        }
        if self.fine > 0 {
            write!(
                f,
                " Returned {} days late, fine due: {}.",
                self.days_overdue, self.fine
            )?;
        }
        Ok(())
    }
}

/// Outcome of a successful reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveReceipt {
    pub entry: ReservationEntry,
    /// 1-based position in the book's queue.
    pub position: usize,
}

impl Display for ReserveReceipt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reserved successfully. Queue position: {}", self.position)
    }
}

/// One book currently held by a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedBook {
    pub book: Book,
    pub issue_date: i64,
    pub due_date: i64,
    pub is_overdue: bool,
}

/// Member profile with current holdings and pending reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDetails {
    pub member: Member,
    pub issued_books: Vec<IssuedBook>,
    pub reservations: Vec<ReservationEntry>,
}

/// Overdue record labelled for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueLine {
    #[serde(flatten)]
    pub record: OverdueRecord,
    pub book_title: String,
    pub member_name: String,
}
