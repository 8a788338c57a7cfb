//! Circulation engine: the single entry point for library operations.
//!
//! # Responsibility
//! - Validate every precondition of issue/return/reserve/cancel before the
//!   first mutation, then apply the steps under the book's lock.
//! - Roll back earlier steps when a later one fails, so no operation
//!   commits partially.
//! - Keep the search index in step with catalog inserts and removals.
//!
//! # Invariants
//! - For every book: `available_copies + active loans == total_copies`.
//! - Lock order is maintenance gate, then one book lock, then store
//!   internals. No lock is held across I/O.
//! - Copies beyond `available - min(available, queue_len)` are committed to
//!   queued members; only the queue head may claim one.
//!
//! # See also
//! - crate::store for the owning components.

use super::book_locks::BookLocks;
use super::receipts::{
    IssueReceipt, IssuedBook, MemberDetails, OverdueLine, ReserveReceipt, ReturnReceipt,
};
use super::sample_data::{sample_books, sample_members};
use crate::clock::{Clock, SystemClock};
use crate::config::LibraryConfig;
use crate::error::{LibraryError, LibraryResult, NotFoundTarget};
use crate::model::book::{Book, BookId, NewBook};
use crate::model::loan::{whole_days_between, OverdueRecord};
use crate::model::member::{Member, MemberId, NewMember};
use crate::model::reservation::ReservationEntry;
use crate::model::snapshot::LibrarySnapshot;
use crate::search::index::SearchIndex;
use crate::store::catalog::Catalog;
use crate::store::directory::Directory;
use crate::store::ledger::CirculationLedger;
use crate::store::reservation_queue::ReservationQueue;
use crate::store::{mutex_guard, read_guard, write_guard};
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Copies a walk-in borrower may take: those not committed to the queue.
pub fn free_copies(available_copies: u32, queue_len: usize) -> u32 {
    let committed = u32::try_from(queue_len).unwrap_or(u32::MAX);
    available_copies - available_copies.min(committed)
}

pub struct CirculationEngine {
    config: LibraryConfig,
    clock: Arc<dyn Clock>,
    catalog: Catalog,
    directory: Directory,
    reservations: ReservationQueue,
    ledger: CirculationLedger,
    search: RwLock<SearchIndex>,
    locks: BookLocks,
    // Shared by every mutation, exclusive for snapshots and audits.
    maintenance: RwLock<()>,
}

impl CirculationEngine {
    /// Empty library on the system clock.
    pub fn new(config: LibraryConfig) -> LibraryResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Empty library on a caller-supplied clock.
    pub fn with_clock(config: LibraryConfig, clock: Arc<dyn Clock>) -> LibraryResult<Self> {
        config.validate()?;
        Ok(Self {
            catalog: Catalog::new(),
            directory: Directory::new(),
            reservations: ReservationQueue::new(config.reservation_queue_capacity),
            ledger: CirculationLedger::new(&config),
            search: RwLock::new(SearchIndex::new()),
            locks: BookLocks::default(),
            maintenance: RwLock::new(()),
            config,
            clock,
        })
    }

    /// Rebuilds a library from a persisted snapshot.
    ///
    /// # Errors
    /// - `Config` when `config` is invalid.
    /// - `InvalidData` when the snapshot breaks copy accounting, references
    ///   unknown books or members, repeats a loan or reservation, or queues
    ///   a member for a book they currently hold.
    pub fn from_snapshot(
        config: LibraryConfig,
        clock: Arc<dyn Clock>,
        snapshot: LibrarySnapshot,
    ) -> LibraryResult<Self> {
        let started_at = Instant::now();
        let result = Self::restore(config, clock, snapshot);
        match &result {
            Ok(engine) => info!(
                "event=engine_restore module=circulation status=ok books={} members={} duration_ms={}",
                engine.catalog.len(),
                engine.directory.list().len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=engine_restore module=circulation status=error error_code={} duration_ms={} error={}",
                err.code(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn restore(
        config: LibraryConfig,
        clock: Arc<dyn Clock>,
        snapshot: LibrarySnapshot,
    ) -> LibraryResult<Self> {
        config.validate()?;
        let LibrarySnapshot {
            books,
            members,
            loans,
            reservations,
            next_book_id,
            next_member_id,
        } = snapshot;

        let mut active_per_book: HashMap<BookId, u32> = HashMap::new();
        let mut active_pairs: HashSet<(BookId, MemberId)> = HashSet::new();
        for loan in loans.iter().filter(|loan| loan.is_active()) {
            *active_per_book.entry(loan.book_id).or_default() += 1;
            active_pairs.insert((loan.book_id, loan.member_id));
        }
        let issue_counts = books
            .iter()
            .map(|book| (book.id, book.times_issued))
            .collect::<Vec<_>>();

        let catalog = Catalog::restore(books, next_book_id)?;
        let directory = Directory::restore(members, next_member_id)?;

        // Closed loans may outlive a removed book; active ones may not.
        for loan in &loans {
            let book_known = !loan.is_active() || catalog.contains(loan.book_id);
            if !book_known || !directory.contains(loan.member_id) {
                return Err(LibraryError::InvalidData(format!(
                    "loan references unknown book {} or member {}",
                    loan.book_id, loan.member_id
                )));
            }
        }
        for book in catalog.list() {
            let active = active_per_book.get(&book.id).copied().unwrap_or(0);
            if book.available_copies.checked_add(active) != Some(book.total_copies) {
                return Err(LibraryError::InvalidData(format!(
                    "book {} has {} available and {active} on loan of {} copies",
                    book.id, book.available_copies, book.total_copies
                )));
            }
        }

        let mut queued_per_book: HashMap<BookId, usize> = HashMap::new();
        for entry in &reservations {
            if !catalog.contains(entry.book_id) || !directory.contains(entry.member_id) {
                return Err(LibraryError::InvalidData(format!(
                    "reservation references unknown book {} or member {}",
                    entry.book_id, entry.member_id
                )));
            }
            if active_pairs.contains(&(entry.book_id, entry.member_id)) {
                return Err(LibraryError::InvalidData(format!(
                    "member {} both holds and waits for book {}",
                    entry.member_id, entry.book_id
                )));
            }
            let queued = queued_per_book.entry(entry.book_id).or_default();
            *queued += 1;
            if *queued > config.reservation_queue_capacity {
                return Err(LibraryError::InvalidData(format!(
                    "reservation queue for book {} exceeds capacity {}",
                    entry.book_id, config.reservation_queue_capacity
                )));
            }
        }

        let ledger = CirculationLedger::restore(&config, loans, issue_counts)?;
        let queue = ReservationQueue::restore(config.reservation_queue_capacity, reservations)?;
        let mut search = SearchIndex::new();
        search.rebuild(&catalog.list());

        Ok(Self {
            catalog,
            directory,
            reservations: queue,
            ledger,
            search: RwLock::new(search),
            locks: BookLocks::default(),
            maintenance: RwLock::new(()),
            config,
            clock,
        })
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Current instant according to the engine's clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    // ---- catalog -------------------------------------------------------

    pub fn register_book(
        &self,
        title: &str,
        author: &str,
        category: &str,
        total_copies: u32,
    ) -> LibraryResult<Book> {
        let started_at = Instant::now();
        let result = self.register_book_inner(&NewBook::new(title, author, category, total_copies));
        let subject = match &result {
            Ok(book) => format!("book_id={}", book.id),
            Err(_) => "book_id=none".to_string(),
        };
        log_outcome("book_register", &subject, &result, started_at);
        result
    }

    fn register_book_inner(&self, new_book: &NewBook) -> LibraryResult<Book> {
        let _gate = read_guard(&self.maintenance);
        let book = self.catalog.register(new_book)?;
        write_guard(&self.search).upsert(&book);
        Ok(book)
    }

    pub fn get_book(&self, book_id: BookId) -> LibraryResult<Book> {
        self.catalog.get(book_id)
    }

    /// Every book in id order.
    pub fn list_books(&self) -> Vec<Book> {
        self.catalog.list()
    }

    /// Books whose category equals `category`, ignoring case.
    pub fn list_books_by_category(&self, category: &str) -> Vec<Book> {
        self.catalog.list_by_category(category)
    }

    /// Ranked matches resolved to live catalog records.
    ///
    /// Hits for books removed after the index lookup are skipped.
    pub fn search_books(&self, query: &str) -> Vec<Book> {
        let hits = read_guard(&self.search).query(query);
        let books = hits
            .into_iter()
            .filter_map(|hit| self.catalog.get(hit.book_id).ok())
            .collect::<Vec<_>>();
        debug!(
            "event=book_search module=circulation status=ok query_len={} hits={}",
            query.chars().count(),
            books.len()
        );
        books
    }

    /// Removes a title nobody holds or waits for.
    ///
    /// # Errors
    /// - `NotFound` for unknown ids.
    /// - `BookInUse` while active loans or pending reservations exist.
    pub fn remove_book(&self, book_id: BookId) -> LibraryResult<Book> {
        let started_at = Instant::now();
        let result = self.remove_book_inner(book_id);
        log_outcome("book_remove", &format!("book_id={book_id}"), &result, started_at);
        result
    }

    fn remove_book_inner(&self, book_id: BookId) -> LibraryResult<Book> {
        let _gate = read_guard(&self.maintenance);
        self.with_book_lock(book_id, |_| self.remove_locked(book_id))
    }

    fn remove_locked(&self, book_id: BookId) -> LibraryResult<Book> {
        let active_loans = self.ledger.active_count_for_book(book_id);
        let pending_reservations = self.reservations.len(book_id);
        if active_loans > 0 || pending_reservations > 0 {
            return Err(LibraryError::BookInUse {
                book_id,
                active_loans,
                pending_reservations,
            });
        }

        let removed = self.catalog.remove(book_id)?;
        self.reservations.forget_book(book_id);
        write_guard(&self.search).remove(book_id);
        self.locks.forget(book_id);
        Ok(removed)
    }

    // ---- members -------------------------------------------------------

    pub fn register_member(&self, name: &str, email: &str, phone: &str) -> LibraryResult<Member> {
        let started_at = Instant::now();
        let result = {
            let _gate = read_guard(&self.maintenance);
            self.directory
                .register(&NewMember::new(name, email, phone), self.clock.now_ms())
        };
        let subject = match &result {
            Ok(member) => format!("member_id={}", member.id),
            Err(_) => "member_id=none".to_string(),
        };
        log_outcome("member_register", &subject, &result, started_at);
        result
    }

    pub fn get_member(&self, member_id: MemberId) -> LibraryResult<Member> {
        self.directory.get(member_id)
    }

    pub fn list_members(&self) -> Vec<Member> {
        self.directory.list()
    }

    /// Profile, current holdings and pending reservations of one member.
    pub fn get_member_details(&self, member_id: MemberId) -> LibraryResult<MemberDetails> {
        let member = self.directory.get(member_id)?;
        let now_ms = self.clock.now_ms();
        let issued_books = self
            .ledger
            .active_loans_for(member_id)
            .into_iter()
            .map(|loan| {
                let book = self.live_book(loan.book_id)?;
                Ok(IssuedBook {
                    book,
                    issue_date: loan.issue_date,
                    due_date: loan.due_date,
                    is_overdue: loan.is_overdue_at(now_ms),
                })
            })
            .collect::<LibraryResult<Vec<_>>>()?;
        Ok(MemberDetails {
            member,
            issued_books,
            reservations: self.reservations.list_for_member(member_id),
        })
    }

    // ---- circulation ---------------------------------------------------

    /// Lends one copy of `book_id` to `member_id`.
    ///
    /// # Errors
    /// - `NotFound` for unknown book or member.
    /// - `DuplicateLoan` when the member already holds the book.
    /// - `Unavailable` when no copy may go to this member: the shelf is
    ///   empty, or every shelved copy is committed to earlier reservations.
    pub fn issue_book(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<IssueReceipt> {
        let started_at = Instant::now();
        let result = self.issue_inner(book_id, member_id);
        log_outcome(
            "book_issue",
            &format!("book_id={book_id} member_id={member_id}"),
            &result,
            started_at,
        );
        result
    }

    fn issue_inner(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<IssueReceipt> {
        let _gate = read_guard(&self.maintenance);
        self.with_book_lock(book_id, |current| self.issue_locked(current, member_id))
    }

    fn issue_locked(&self, current: Book, member_id: MemberId) -> LibraryResult<IssueReceipt> {
        let book_id = current.id;
        self.directory.get(member_id)?;
        if self.ledger.has_active_loan(book_id, member_id) {
            return Err(LibraryError::DuplicateLoan { book_id, member_id });
        }
        let queue_len = self.reservations.len(book_id);
        let is_head = self
            .reservations
            .head_entry(book_id)
            .is_some_and(|head| head.member_id == member_id);
        let claims = is_head && current.available_copies > 0;
        if !claims && free_copies(current.available_copies, queue_len) == 0 {
            return Err(LibraryError::Unavailable { book_id });
        }
        let issued_so_far = self.ledger.issue_count(book_id);
        if issued_so_far != current.times_issued {
            return Err(LibraryError::invariant(format!(
                "book {book_id} shows {} issues but the ledger counted {issued_so_far}",
                current.times_issued
            )));
        }

        let now_ms = self.clock.now_ms();
        self.catalog.check_out_copy(book_id)?;
        let loan = match self.ledger.open_loan(book_id, member_id, now_ms) {
            Ok(loan) => loan,
            Err(err) => {
                self.catalog.revert_check_out(book_id)?;
                return Err(err);
            }
        };
        if claims && !self.reservations.dequeue_if_matches(book_id, member_id) {
            self.ledger.discard_open_loan(book_id, member_id);
            self.catalog.revert_check_out(book_id)?;
            return Err(LibraryError::invariant(format!(
                "queue head for book {book_id} changed under its lock"
            )));
        }
        if !claims {
            // A waiting member served from a free copy no longer needs a place.
            self.reservations.cancel(book_id, member_id);
        }
        let issued = self.ledger.increment_issue_count(book_id);
        let book = self.catalog.record_issue_count(book_id, issued)?;

        Ok(IssueReceipt {
            loan,
            book,
            from_reservation: claims,
            loan_period_days: self.config.loan_period_days,
        })
    }

    /// Takes back the member's copy of `book_id`.
    ///
    /// The freed copy is held for the queue head, if any; the receipt names
    /// that member.
    ///
    /// # Errors
    /// - `NotFound` for unknown book or member.
    /// - `NoSuchLoan` when the member holds no copy.
    pub fn return_book(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<ReturnReceipt> {
        let started_at = Instant::now();
        let result = self.return_inner(book_id, member_id);
        log_outcome(
            "book_return",
            &format!("book_id={book_id} member_id={member_id}"),
            &result,
            started_at,
        );
        result
    }

    fn return_inner(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<ReturnReceipt> {
        let _gate = read_guard(&self.maintenance);
        self.with_book_lock(book_id, |_| self.return_locked(book_id, member_id))
    }

    fn return_locked(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<ReturnReceipt> {
        self.directory.get(member_id)?;

        let now_ms = self.clock.now_ms();
        let loan = self.ledger.close_loan(book_id, member_id, now_ms)?;
        let book = match self.catalog.adjust_availability(book_id, 1) {
            Ok(book) => book,
            Err(err) => {
                self.ledger.reopen_loan(book_id, member_id);
                return Err(err);
            }
        };

        let days_overdue = if loan.due_date < now_ms {
            whole_days_between(loan.due_date, now_ms)
        } else {
            0
        };
        Ok(ReturnReceipt {
            held_for: self.reservations.peek_next(book_id),
            fine: days_overdue.saturating_mul(self.ledger.fine_rate_per_day()),
            days_overdue,
            loan,
            book,
        })
    }

    /// Queues the member for the next committed copy of `book_id`.
    ///
    /// # Errors
    /// - `NotFound` for unknown book or member.
    /// - `DuplicateLoan` when the member already holds the book.
    /// - `UnavailableForReservation` while a free copy can be issued directly.
    /// - `AlreadyReserved` / `QueueFull` from the queue.
    pub fn reserve_book(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<ReserveReceipt> {
        let started_at = Instant::now();
        let result = self.reserve_inner(book_id, member_id);
        log_outcome(
            "book_reserve",
            &format!("book_id={book_id} member_id={member_id}"),
            &result,
            started_at,
        );
        result
    }

    fn reserve_inner(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<ReserveReceipt> {
        let _gate = read_guard(&self.maintenance);
        self.with_book_lock(book_id, |book| self.reserve_locked(book, member_id))
    }

    fn reserve_locked(&self, book: Book, member_id: MemberId) -> LibraryResult<ReserveReceipt> {
        let book_id = book.id;
        self.directory.get(member_id)?;
        if self.ledger.has_active_loan(book_id, member_id) {
            return Err(LibraryError::DuplicateLoan { book_id, member_id });
        }
        let free = free_copies(book.available_copies, self.reservations.len(book_id));
        if free > 0 {
            return Err(LibraryError::UnavailableForReservation {
                book_id,
                free_copies: free,
            });
        }

        let reserved_at = self.clock.now_ms();
        let position = self.reservations.enqueue(book_id, member_id, reserved_at)?;
        Ok(ReserveReceipt {
            entry: ReservationEntry {
                book_id,
                member_id,
                reserved_at,
            },
            position,
        })
    }

    /// Withdraws a pending reservation wherever it sits in the queue.
    ///
    /// # Errors
    /// - `NotFound` for an unknown book or when no such reservation exists.
    pub fn cancel_reservation(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<()> {
        let started_at = Instant::now();
        let result = self.cancel_inner(book_id, member_id);
        log_outcome(
            "reservation_cancel",
            &format!("book_id={book_id} member_id={member_id}"),
            &result,
            started_at,
        );
        result
    }

    fn cancel_inner(&self, book_id: BookId, member_id: MemberId) -> LibraryResult<()> {
        let _gate = read_guard(&self.maintenance);
        self.with_book_lock(book_id, |_| {
            if self.reservations.cancel(book_id, member_id) {
                Ok(())
            } else {
                Err(LibraryError::NotFound(NotFoundTarget::Reservation {
                    book_id,
                    member_id,
                }))
            }
        })
    }

    /// Every pending reservation: book id order, then queue order.
    pub fn list_reservations(&self) -> Vec<ReservationEntry> {
        self.reservations.list_all()
    }

    pub fn list_reservations_for_book(&self, book_id: BookId) -> LibraryResult<Vec<ReservationEntry>> {
        self.catalog.get(book_id)?;
        Ok(self.reservations.list_for_book(book_id))
    }

    // ---- reporting -----------------------------------------------------

    /// Active loans past due at `now_ms`, most overdue first.
    pub fn overdue_report(&self, now_ms: i64) -> Vec<OverdueRecord> {
        self.ledger.overdue_snapshot(now_ms)
    }

    /// [`Self::overdue_report`] labelled with book title and member name.
    pub fn overdue_report_lines(&self, now_ms: i64) -> LibraryResult<Vec<OverdueLine>> {
        self.ledger
            .overdue_snapshot(now_ms)
            .into_iter()
            .map(|record| {
                let book = self.live_book(record.book_id)?;
                let member = self.directory.get(record.member_id).map_err(|_| {
                    LibraryError::invariant(format!(
                        "loan held by unknown member {}",
                        record.member_id
                    ))
                })?;
                Ok(OverdueLine {
                    record,
                    book_title: book.title,
                    member_name: member.name,
                })
            })
            .collect()
    }

    /// Sum of fines accrued by active overdue loans at `now_ms`.
    pub fn total_outstanding_fines(&self, now_ms: i64) -> u64 {
        self.ledger
            .overdue_snapshot(now_ms)
            .iter()
            .fold(0u64, |total, record| total.saturating_add(record.fine))
    }

    // ---- fixtures ------------------------------------------------------

    pub fn load_sample_books(&self) -> LibraryResult<Vec<Book>> {
        sample_books()
            .iter()
            .map(|book| {
                self.register_book(&book.title, &book.author, &book.category, book.total_copies)
            })
            .collect()
    }

    pub fn load_sample_members(&self) -> LibraryResult<Vec<Member>> {
        sample_members()
            .iter()
            .map(|member| self.register_member(&member.name, &member.email, &member.phone))
            .collect()
    }

    // ---- maintenance ---------------------------------------------------

    /// Consistent copy of every record, taken with all mutations paused.
    pub fn snapshot(&self) -> LibrarySnapshot {
        let _gate = write_guard(&self.maintenance);
        LibrarySnapshot {
            books: self.catalog.list(),
            members: self.directory.list(),
            loans: self.ledger.all_loans(),
            reservations: self.reservations.list_all(),
            next_book_id: self.catalog.next_id(),
            next_member_id: self.directory.next_id(),
        }
    }

    /// Checks `available + active loans == total` and that `times_issued`
    /// matches the ledger's issue count, for every book.
    ///
    /// # Errors
    /// - `InvariantViolation` naming the first inconsistent book.
    pub fn verify_copy_accounting(&self) -> LibraryResult<()> {
        let _gate = write_guard(&self.maintenance);
        for book in self.catalog.list() {
            let active = self.ledger.active_count_for_book(book.id);
            let accounted = usize::try_from(book.available_copies)
                .ok()
                .and_then(|available| available.checked_add(active));
            if book.available_copies > book.total_copies
                || accounted != usize::try_from(book.total_copies).ok()
            {
                let err = LibraryError::invariant(format!(
                    "book {} has {} available and {active} on loan of {} copies",
                    book.id, book.available_copies, book.total_copies
                ));
                error!(
                    "event=copy_audit module=circulation status=error book_id={} error_code={}",
                    book.id,
                    err.code()
                );
                return Err(err);
            }
            let issued = self.ledger.issue_count(book.id);
            if issued != book.times_issued {
                let err = LibraryError::invariant(format!(
                    "book {} shows {} issues but the ledger counted {issued}",
                    book.id, book.times_issued
                ));
                error!(
                    "event=copy_audit module=circulation status=error book_id={} error_code={}",
                    book.id,
                    err.code()
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Runs `work` on the current record of `book_id` under that book's lock.
    ///
    /// Unknown ids are rejected before a lock slot exists. A book removed
    /// while this call waited for the lock also drops the slot it created.
    fn with_book_lock<T>(
        &self,
        book_id: BookId,
        work: impl FnOnce(Book) -> LibraryResult<T>,
    ) -> LibraryResult<T> {
        if !self.catalog.contains(book_id) {
            return Err(LibraryError::NotFound(NotFoundTarget::Book(book_id)));
        }
        let slot = self.locks.slot(book_id);
        let _book = mutex_guard(&slot);
        match self.catalog.get(book_id) {
            Ok(book) => work(book),
            Err(err) => {
                self.locks.forget(book_id);
                Err(err)
            }
        }
    }

    fn live_book(&self, book_id: BookId) -> LibraryResult<Book> {
        self.catalog.get(book_id).map_err(|_| {
            LibraryError::invariant(format!("loan references removed book {book_id}"))
        })
    }
}

fn log_outcome<T>(event: &str, subject: &str, result: &LibraryResult<T>, started_at: Instant) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!(
            "event={event} module=circulation status=ok {subject} duration_ms={duration_ms}"
        ),
        Err(err) if err.is_internal() => error!(
            "event={event} module=circulation status=error {subject} error_code={} duration_ms={duration_ms} error={err}",
            err.code()
        ),
        Err(err) => info!(
            "event={event} module=circulation status=rejected {subject} error_code={} duration_ms={duration_ms}",
            err.code()
        ),
    }
}
