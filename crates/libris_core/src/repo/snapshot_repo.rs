//! Snapshot repository contract and SQLite implementation.
//!
//! # Invariants
//! - `save_snapshot` replaces every row inside one transaction; a failed
//!   save leaves the previous snapshot intact. Inside a caller's transaction
//!   it joins that transaction instead of opening its own.
//! - A load/mutate/save cycle run through [`with_write_lock`] holds the
//!   database write lock from the first read to the commit.
//! - `load_snapshot` returns loans in issue order and reservations in queue
//!   order per book.

use crate::error::{LibraryError, LibraryResult};
use crate::model::book::Book;
use crate::model::loan::Loan;
use crate::model::member::Member;
use crate::model::reservation::ReservationEntry;
use crate::model::snapshot::LibrarySnapshot;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::time::Instant;

const META_NEXT_BOOK_ID: &str = "next_book_id";
const META_NEXT_MEMBER_ID: &str = "next_member_id";

pub trait SnapshotRepository {
    fn save_snapshot(&self, snapshot: &LibrarySnapshot) -> LibraryResult<()>;
    /// `Ok(None)` when nothing has been saved yet.
    fn load_snapshot(&self) -> LibraryResult<Option<LibrarySnapshot>>;
}

/// Runs `work` inside one `BEGIN IMMEDIATE` transaction and commits when it
/// succeeds.
///
/// Another connection trying the same waits for its busy timeout and then
/// fails with a database error, so two processes can never both load the
/// same state and overwrite each other's save.
pub fn with_write_lock<T, F>(conn: &mut Connection, work: F) -> LibraryResult<T>
where
    F: FnOnce(&SqliteSnapshotRepository<'_>) -> LibraryResult<T>,
{
    let started_at = Instant::now();
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| {
            let err = LibraryError::from(err);
            error!(
                "event=snapshot_lock module=repo status=error error_code={} duration_ms={} error={err}",
                err.code(),
                started_at.elapsed().as_millis()
            );
            err
        })?;
    let value = work(&SqliteSnapshotRepository::new(&tx))?;
    tx.commit()?;
    Ok(value)
}

pub struct SqliteSnapshotRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSnapshotRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write_all(&self, snapshot: &LibrarySnapshot) -> LibraryResult<()> {
        let own_tx = if self.conn.is_autocommit() {
            Some(self.conn.unchecked_transaction()?)
        } else {
            None
        };
        self.conn.execute_batch(
            "DELETE FROM reservations;
             DELETE FROM loans;
             DELETE FROM members;
             DELETE FROM books;
             DELETE FROM library_meta;",
        )?;

        {
            let mut insert_book = self.conn.prepare(
                "INSERT INTO books (id, title, author, category, total_copies, available_copies, times_issued)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            )?;
            for book in &snapshot.books {
                let times_issued = i64::try_from(book.times_issued).map_err(|_| {
                    LibraryError::InvalidData(format!("book {} issue count overflows", book.id))
                })?;
                insert_book.execute(params![
                    book.id,
                    book.title,
                    book.author,
                    book.category,
                    book.total_copies,
                    book.available_copies,
                    times_issued,
                ])?;
            }

            let mut insert_member = self.conn.prepare(
                "INSERT INTO members (id, name, email, phone, registration_date)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for member in &snapshot.members {
                insert_member.execute(params![
                    member.id,
                    member.name,
                    member.email,
                    member.phone,
                    member.registration_date,
                ])?;
            }

            let mut insert_loan = self.conn.prepare(
                "INSERT INTO loans (seq, book_id, member_id, issue_date, due_date, return_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            for (seq, loan) in (1_i64..).zip(&snapshot.loans) {
                insert_loan.execute(params![
                    seq,
                    loan.book_id,
                    loan.member_id,
                    loan.issue_date,
                    loan.due_date,
                    loan.return_date,
                ])?;
            }

            let mut insert_reservation = self.conn.prepare(
                "INSERT INTO reservations (book_id, member_id, position, reserved_at)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            let mut position = 0_i64;
            let mut previous_book = None;
            for entry in &snapshot.reservations {
                if previous_book != Some(entry.book_id) {
                    position = 0;
                    previous_book = Some(entry.book_id);
                }
                insert_reservation.execute(params![
                    entry.book_id,
                    entry.member_id,
                    position,
                    entry.reserved_at,
                ])?;
                position += 1;
            }

            let mut insert_meta =
                self.conn.prepare("INSERT INTO library_meta (key, value) VALUES (?1, ?2);")?;
            insert_meta.execute(params![META_NEXT_BOOK_ID, snapshot.next_book_id])?;
            insert_meta.execute(params![META_NEXT_MEMBER_ID, snapshot.next_member_id])?;
        }

        if let Some(tx) = own_tx {
            tx.commit()?;
        }
        Ok(())
    }

    fn read_all(&self) -> LibraryResult<Option<LibrarySnapshot>> {
        let Some(next_book_id) = self.meta(META_NEXT_BOOK_ID)? else {
            return Ok(None);
        };
        let next_member_id = self.meta(META_NEXT_MEMBER_ID)?.ok_or_else(|| {
            LibraryError::InvalidData(format!("library_meta.{META_NEXT_MEMBER_ID} is missing"))
        })?;

        let books = self.collect(
            "SELECT id, title, author, category, total_copies, available_copies, times_issued
             FROM books ORDER BY id ASC;",
            parse_book_row,
        )?;
        let members = self.collect(
            "SELECT id, name, email, phone, registration_date
             FROM members ORDER BY id ASC;",
            parse_member_row,
        )?;
        let loans = self.collect(
            "SELECT book_id, member_id, issue_date, due_date, return_date
             FROM loans ORDER BY seq ASC;",
            parse_loan_row,
        )?;
        let reservations = self.collect(
            "SELECT book_id, member_id, reserved_at
             FROM reservations ORDER BY book_id ASC, position ASC;",
            parse_reservation_row,
        )?;

        Ok(Some(LibrarySnapshot {
            books,
            members,
            loans,
            reservations,
            next_book_id,
            next_member_id,
        }))
    }

    fn meta(&self, key: &str) -> LibraryResult<Option<u32>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM library_meta WHERE key = ?1;",
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        value
            .map(|raw| {
                u32::try_from(raw).map_err(|_| {
                    LibraryError::InvalidData(format!("invalid library_meta.{key} value `{raw}`"))
                })
            })
            .transpose()
    }

    fn collect<T>(
        &self,
        sql: &str,
        parse: fn(&Row<'_>) -> LibraryResult<T>,
    ) -> LibraryResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse(row)?);
        }
        Ok(items)
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn save_snapshot(&self, snapshot: &LibrarySnapshot) -> LibraryResult<()> {
        let started_at = Instant::now();
        let result = self.write_all(snapshot);
        match &result {
            Ok(()) => info!(
                "event=snapshot_save module=repo status=ok books={} members={} loans={} reservations={} duration_ms={}",
                snapshot.books.len(),
                snapshot.members.len(),
                snapshot.loans.len(),
                snapshot.reservations.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=snapshot_save module=repo status=error error_code={} duration_ms={} error={err}",
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn load_snapshot(&self) -> LibraryResult<Option<LibrarySnapshot>> {
        let started_at = Instant::now();
        let result = self.read_all();
        match &result {
            Ok(found) => info!(
                "event=snapshot_load module=repo status=ok found={} duration_ms={}",
                found.is_some(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=snapshot_load module=repo status=error error_code={} duration_ms={} error={err}",
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}

fn parse_book_row(row: &Row<'_>) -> LibraryResult<Book> {
    let id = row.get::<_, u32>("id")?;
    let total_copies = row.get::<_, u32>("total_copies")?;
    let available_copies = row.get::<_, u32>("available_copies")?;
    if total_copies < 1 || available_copies > total_copies {
        return Err(LibraryError::InvalidData(format!(
            "invalid copy counts {available_copies}/{total_copies} in books row {id}"
        )));
    }
    let times_issued_raw = row.get::<_, i64>("times_issued")?;
    let times_issued = u64::try_from(times_issued_raw).map_err(|_| {
        LibraryError::InvalidData(format!(
            "invalid times_issued `{times_issued_raw}` in books row {id}"
        ))
    })?;
    Ok(Book {
        id,
        title: row.get("title")?,
        author: row.get("author")?,
        category: row.get("category")?,
        total_copies,
        available_copies,
        times_issued,
    })
}

fn parse_member_row(row: &Row<'_>) -> LibraryResult<Member> {
    Ok(Member {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        registration_date: row.get("registration_date")?,
    })
}

fn parse_loan_row(row: &Row<'_>) -> LibraryResult<Loan> {
    let loan = Loan {
        book_id: row.get("book_id")?,
        member_id: row.get("member_id")?,
        issue_date: row.get("issue_date")?,
        due_date: row.get("due_date")?,
        return_date: row.get("return_date")?,
    };
    if loan.return_date.is_some_and(|returned| returned < loan.issue_date) {
        return Err(LibraryError::InvalidData(format!(
            "loan of book {} to member {} returned before issue",
            loan.book_id, loan.member_id
        )));
    }
    Ok(loan)
}

fn parse_reservation_row(row: &Row<'_>) -> LibraryResult<ReservationEntry> {
    Ok(ReservationEntry {
        book_id: row.get("book_id")?,
        member_id: row.get("member_id")?,
        reserved_at: row.get("reserved_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{SnapshotRepository, SqliteSnapshotRepository};
    use crate::db::open_db_in_memory;
    use crate::error::LibraryError;

    #[test]
    fn empty_database_has_no_snapshot() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSnapshotRepository::new(&conn);
        assert!(repo.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn corrupt_copy_counts_are_rejected() {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO library_meta (key, value) VALUES ('next_book_id', 102), ('next_member_id', 1);
             PRAGMA ignore_check_constraints = ON;
             INSERT INTO books (id, title, author, category, total_copies, available_copies, times_issued)
             VALUES (101, 'Clean Code', 'Robert C. Martin', 'Tech', 1, 3, 0);",
        )
        .unwrap();
        let repo = SqliteSnapshotRepository::new(&conn);
        assert!(matches!(
            repo.load_snapshot(),
            Err(LibraryError::InvalidData(_))
        ));
    }
}
