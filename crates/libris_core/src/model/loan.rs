//! Loan records and the derived overdue view.
//!
//! # Invariants
//! - A loan is active while `return_date` is `None`.
//! - Overdue figures are derived from `due_date` and an evaluation instant;
//!   they are never stored.

use super::book::BookId;
use super::member::MemberId;
use crate::config::MS_PER_DAY;
use serde::{Deserialize, Serialize};

/// One copy held by one member between issue and return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub book_id: BookId,
    pub member_id: MemberId,
    /// Unix epoch milliseconds.
    pub issue_date: i64,
    /// Unix epoch milliseconds.
    pub due_date: i64,
    /// Unix epoch milliseconds; `None` while the loan is active.
    pub return_date: Option<i64>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }

    /// Active and past due at `now_ms`.
    pub fn is_overdue_at(&self, now_ms: i64) -> bool {
        self.is_active() && self.due_date < now_ms
    }

    /// Projects the overdue view at `now_ms`, or `None` when not overdue.
    pub fn overdue_at(&self, now_ms: i64, fine_rate_per_day: u64) -> Option<OverdueRecord> {
        if !self.is_overdue_at(now_ms) {
            return None;
        }
        let days_overdue = whole_days_between(self.due_date, now_ms);
        Some(OverdueRecord {
            book_id: self.book_id,
            member_id: self.member_id,
            due_date: self.due_date,
            days_overdue,
            fine: days_overdue.saturating_mul(fine_rate_per_day),
        })
    }
}

/// Derived overdue view of one active loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueRecord {
    pub book_id: BookId,
    pub member_id: MemberId,
    pub due_date: i64,
    pub days_overdue: u64,
    /// Currency units.
    pub fine: u64,
}

/// Floors `(to - from)` to whole days; 0 when `to <= from`.
pub fn whole_days_between(from_ms: i64, to_ms: i64) -> u64 {
    let elapsed = to_ms.saturating_sub(from_ms);
    if elapsed <= 0 {
        return 0;
    }
    u64::try_from(elapsed / MS_PER_DAY).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{whole_days_between, Loan};
    use crate::config::MS_PER_DAY;

    fn loan(due: i64) -> Loan {
        Loan {
            book_id: 101,
            member_id: 1,
            issue_date: due - 14 * MS_PER_DAY,
            due_date: due,
            return_date: None,
        }
    }

    #[test]
    fn seven_days_late_costs_seven_times_rate() {
        let due = 1_700_000_000_000;
        let record = loan(due).overdue_at(due + 7 * MS_PER_DAY, 5).expect("overdue");
        assert_eq!(record.days_overdue, 7);
        assert_eq!(record.fine, 35);
    }

    #[test]
    fn due_instant_is_not_overdue() {
        let due = 1_700_000_000_000;
        assert!(loan(due).overdue_at(due, 5).is_none());
    }

    #[test]
    fn partial_days_truncate() {
        assert_eq!(whole_days_between(0, MS_PER_DAY - 1), 0);
        assert_eq!(whole_days_between(0, 3 * MS_PER_DAY + 5), 3);
        assert_eq!(whole_days_between(10, 0), 0);
    }

    #[test]
    fn returned_loan_is_never_overdue() {
        let due = 1_700_000_000_000;
        let mut closed = loan(due);
        closed.return_date = Some(due + MS_PER_DAY);
        assert!(closed.overdue_at(due + 30 * MS_PER_DAY, 5).is_none());
    }
}
