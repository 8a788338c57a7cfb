//! Circulation ledger: loans, issue history and overdue projection.
//!
//! # Responsibility
//! - Open and close loans keyed by (book, member).
//! - Keep every loan ever opened for history and analytics.
//! - Derive overdue/fine figures on read.
//!
//! # Invariants
//! - At most one active loan per (book, member) pair.
//! - Closed loans are kept; nothing is hard-deleted.
//! - Issue counts never decrease.

use super::{read_guard, write_guard};
use crate::config::LibraryConfig;
use crate::error::{LibraryError, LibraryResult};
use crate::model::book::BookId;
use crate::model::loan::{Loan, OverdueRecord};
use crate::model::member::MemberId;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type LoanKey = (BookId, MemberId);

#[derive(Debug, Default)]
struct LedgerState {
    /// Every loan keyed by opening sequence, so iteration is issue order.
    loans: BTreeMap<u64, Loan>,
    active: HashMap<LoanKey, u64>,
    issue_counts: HashMap<BookId, u64>,
    next_seq: u64,
}

impl LedgerState {
    fn insert(&mut self, loan: Loan) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if loan.is_active() {
            self.active.insert((loan.book_id, loan.member_id), seq);
        }
        self.loans.insert(seq, loan);
        seq
    }
}

/// Exclusive owner of [`Loan`] records.
#[derive(Debug)]
pub struct CirculationLedger {
    loan_period_ms: i64,
    fine_rate_per_day: u64,
    state: RwLock<LedgerState>,
}

impl CirculationLedger {
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            loan_period_ms: config.loan_period_ms(),
            fine_rate_per_day: config.fine_rate_per_day,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Rebuilds the ledger from persisted loans (issue order) and counts.
    pub(crate) fn restore(
        config: &LibraryConfig,
        loans: Vec<Loan>,
        issue_counts: impl IntoIterator<Item = (BookId, u64)>,
    ) -> LibraryResult<Self> {
        let ledger = Self::new(config);
        {
            let mut state = write_guard(&ledger.state);
            for loan in loans {
                if loan.due_date < loan.issue_date {
                    return Err(LibraryError::InvalidData(format!(
                        "loan of book {} to member {} is due before it was issued",
                        loan.book_id, loan.member_id
                    )));
                }
                if loan.is_active() && state.active.contains_key(&(loan.book_id, loan.member_id))
                {
                    return Err(LibraryError::InvalidData(format!(
                        "member {} holds book {} twice",
                        loan.member_id, loan.book_id
                    )));
                }
                state.insert(loan);
            }
            state.issue_counts.extend(issue_counts);
        }
        Ok(ledger)
    }

    pub fn fine_rate_per_day(&self) -> u64 {
        self.fine_rate_per_day
    }

    /// Opens a loan issued at `now_ms`, due one loan period later.
    ///
    /// # Errors
    /// - `DuplicateLoan` when the pair already has an active loan.
    pub fn open_loan(
        &self,
        book_id: BookId,
        member_id: MemberId,
        now_ms: i64,
    ) -> LibraryResult<Loan> {
        let mut state = write_guard(&self.state);
        if state.active.contains_key(&(book_id, member_id)) {
            return Err(LibraryError::DuplicateLoan { book_id, member_id });
        }
        let loan = Loan {
            book_id,
            member_id,
            issue_date: now_ms,
            due_date: now_ms.saturating_add(self.loan_period_ms),
            return_date: None,
        };
        state.insert(loan.clone());
        Ok(loan)
    }

    /// Closes the pair's active loan, stamping `return_date = now_ms`.
    ///
    /// # Errors
    /// - `NoSuchLoan` when the pair has no active loan.
    pub fn close_loan(
        &self,
        book_id: BookId,
        member_id: MemberId,
        now_ms: i64,
    ) -> LibraryResult<Loan> {
        let mut state = write_guard(&self.state);
        let seq = state
            .active
            .remove(&(book_id, member_id))
            .ok_or(LibraryError::NoSuchLoan { book_id, member_id })?;
        let loan = state
            .loans
            .get_mut(&seq)
            .ok_or_else(|| LibraryError::invariant("active loan index points at nothing"))?;
        loan.return_date = Some(now_ms);
        Ok(loan.clone())
    }

    /// Drops a loan opened in the same, not yet committed, engine step.
    pub(crate) fn discard_open_loan(&self, book_id: BookId, member_id: MemberId) -> bool {
        let mut state = write_guard(&self.state);
        match state.active.remove(&(book_id, member_id)) {
            Some(seq) => state.loans.remove(&seq).is_some(),
            None => false,
        }
    }

    /// Re-activates a loan closed in the same, not yet committed, engine step.
    pub(crate) fn reopen_loan(&self, book_id: BookId, member_id: MemberId) -> bool {
        let mut state = write_guard(&self.state);
        if state.active.contains_key(&(book_id, member_id)) {
            return false;
        }
        let seq = state
            .loans
            .iter()
            .rev()
            .find(|(_, loan)| {
                loan.book_id == book_id && loan.member_id == member_id && !loan.is_active()
            })
            .map(|(seq, _)| *seq);
        let Some(seq) = seq else {
            return false;
        };
        if let Some(loan) = state.loans.get_mut(&seq) {
            loan.return_date = None;
        }
        state.active.insert((book_id, member_id), seq);
        true
    }

    pub fn has_active_loan(&self, book_id: BookId, member_id: MemberId) -> bool {
        read_guard(&self.state)
            .active
            .contains_key(&(book_id, member_id))
    }

    /// Active loans of one member, in issue order.
    pub fn active_loans_for(&self, member_id: MemberId) -> Vec<Loan> {
        read_guard(&self.state)
            .loans
            .values()
            .filter(|loan| loan.is_active() && loan.member_id == member_id)
            .cloned()
            .collect()
    }

    pub fn active_count_for_book(&self, book_id: BookId) -> usize {
        read_guard(&self.state)
            .active
            .keys()
            .filter(|(loan_book, _)| *loan_book == book_id)
            .count()
    }

    /// Every loan, in issue order.
    pub fn all_loans(&self) -> Vec<Loan> {
        read_guard(&self.state).loans.values().cloned().collect()
    }

    /// Overdue view of active loans at `now_ms`, most overdue first.
    ///
    /// Ties are ordered by ascending book id, then member id.
    pub fn overdue_snapshot(&self, now_ms: i64) -> Vec<OverdueRecord> {
        let mut records = {
            let state = read_guard(&self.state);
            state
                .active
                .values()
                .filter_map(|seq| state.loans.get(seq))
                .filter_map(|loan| loan.overdue_at(now_ms, self.fine_rate_per_day))
                .collect::<Vec<_>>()
        };
        records.sort_by(|a, b| {
            b.days_overdue
                .cmp(&a.days_overdue)
                .then(a.book_id.cmp(&b.book_id))
                .then(a.member_id.cmp(&b.member_id))
        });
        records
    }

    /// Counts one more issue of `book_id`; returns the new total.
    pub fn increment_issue_count(&self, book_id: BookId) -> u64 {
        let mut state = write_guard(&self.state);
        let count = state.issue_counts.entry(book_id).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Committed issues of `book_id`; zero for books never issued.
    pub fn issue_count(&self, book_id: BookId) -> u64 {
        read_guard(&self.state)
            .issue_counts
            .get(&book_id)
            .copied()
            .unwrap_or(0)
    }
}
