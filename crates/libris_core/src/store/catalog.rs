//! Book catalog and per-title copy accounting.
//!
//! # Responsibility
//! - Register titles and hand out sequential book ids.
//! - Own `available_copies`; expose guarded adjustments to the engine only.
//!
//! # Invariants
//! - `0 <= available_copies <= total_copies` for every stored book.
//! - `times_issued` mirrors the ledger's issue count and never decreases.
//! - Listing order is id order, which equals registration order.

use super::{read_guard, write_guard};
use crate::error::{LibraryError, LibraryResult, NotFoundTarget};
use crate::model::book::{Book, BookId, NewBook};
use crate::model::validation::check_length;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// First id handed out by an empty catalog.
pub const FIRST_BOOK_ID: BookId = 101;

#[derive(Debug)]
struct CatalogState {
    books: BTreeMap<BookId, Book>,
    next_id: BookId,
}

/// Exclusive owner of [`Book`] records.
#[derive(Debug)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState {
                books: BTreeMap::new(),
                next_id: FIRST_BOOK_ID,
            }),
        }
    }

    /// Rebuilds a catalog from persisted books.
    ///
    /// # Errors
    /// - `InvalidData` for duplicate ids, ids at or beyond `next_id`, or
    ///   copy counts outside their valid range.
    pub(crate) fn restore(books: Vec<Book>, next_id: BookId) -> LibraryResult<Self> {
        let mut map = BTreeMap::new();
        for book in books {
            if book.total_copies < 1 || book.available_copies > book.total_copies {
                return Err(LibraryError::InvalidData(format!(
                    "book {} has impossible copy counts {}/{}",
                    book.id, book.available_copies, book.total_copies
                )));
            }
            for (field, value) in [
                ("title", &book.title),
                ("author", &book.author),
                ("category", &book.category),
            ] {
                check_length(field, value).map_err(|err| {
                    LibraryError::InvalidData(format!("book {}: {err}", book.id))
                })?;
            }
            if book.id >= next_id {
                return Err(LibraryError::InvalidData(format!(
                    "book id {} is not below next id {next_id}",
                    book.id
                )));
            }
            if map.insert(book.id, book).is_some() {
                return Err(LibraryError::InvalidData(
                    "duplicate book id in snapshot".to_string(),
                ));
            }
        }
        Ok(Self {
            state: RwLock::new(CatalogState {
                books: map,
                next_id: next_id.max(FIRST_BOOK_ID),
            }),
        })
    }

    /// Registers a new title with every copy on the shelf.
    pub fn register(&self, new_book: &NewBook) -> LibraryResult<Book> {
        let normalized = new_book.normalized()?;
        let mut state = write_guard(&self.state);
        let id = state.next_id;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| LibraryError::invariant("book id space exhausted"))?;
        let book = Book {
            id,
            title: normalized.title,
            author: normalized.author,
            category: normalized.category,
            total_copies: normalized.total_copies,
            available_copies: normalized.total_copies,
            times_issued: 0,
        };
        state.books.insert(id, book.clone());
        state.next_id = next_id;
        Ok(book)
    }

    pub fn get(&self, id: BookId) -> LibraryResult<Book> {
        read_guard(&self.state)
            .books
            .get(&id)
            .cloned()
            .ok_or(LibraryError::NotFound(NotFoundTarget::Book(id)))
    }

    pub fn contains(&self, id: BookId) -> bool {
        read_guard(&self.state).books.contains_key(&id)
    }

    pub fn list(&self) -> Vec<Book> {
        read_guard(&self.state).books.values().cloned().collect()
    }

    /// Books whose category equals `category`, ignoring case and padding.
    pub fn list_by_category(&self, category: &str) -> Vec<Book> {
        let wanted = category.trim().to_lowercase();
        if wanted.is_empty() {
            return Vec::new();
        }
        read_guard(&self.state)
            .books
            .values()
            .filter(|book| book.category.to_lowercase() == wanted)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        read_guard(&self.state).books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id the next registration will receive.
    pub fn next_id(&self) -> BookId {
        read_guard(&self.state).next_id
    }

    /// Moves `available_copies` by `delta`.
    ///
    /// # Errors
    /// - `NotFound` for unknown ids.
    /// - `InvariantViolation` when the result leaves `[0, total_copies]`;
    ///   the stored book is left untouched.
    pub(crate) fn adjust_availability(&self, id: BookId, delta: i64) -> LibraryResult<Book> {
        let mut state = write_guard(&self.state);
        let book = state
            .books
            .get_mut(&id)
            .ok_or(LibraryError::NotFound(NotFoundTarget::Book(id)))?;
        let next = i64::from(book.available_copies) + delta;
        if next < 0 || next > i64::from(book.total_copies) {
            return Err(LibraryError::invariant(format!(
                "book {id} availability would become {next} of {}",
                book.total_copies
            )));
        }
        // Bounds checked above, so the value fits in u32.
        book.available_copies = u32::try_from(next)
            .map_err(|_| LibraryError::invariant("availability out of u32 range"))?;
        Ok(book.clone())
    }

    /// Takes one copy off the shelf.
    pub(crate) fn check_out_copy(&self, id: BookId) -> LibraryResult<Book> {
        let mut state = write_guard(&self.state);
        let book = state
            .books
            .get_mut(&id)
            .ok_or(LibraryError::NotFound(NotFoundTarget::Book(id)))?;
        if book.available_copies == 0 {
            return Err(LibraryError::invariant(format!(
                "book {id} checked out with no copy on the shelf"
            )));
        }
        book.available_copies -= 1;
        Ok(book.clone())
    }

    /// Undoes an uncommitted [`Catalog::check_out_copy`].
    pub(crate) fn revert_check_out(&self, id: BookId) -> LibraryResult<Book> {
        let mut state = write_guard(&self.state);
        let book = state
            .books
            .get_mut(&id)
            .ok_or(LibraryError::NotFound(NotFoundTarget::Book(id)))?;
        if book.available_copies >= book.total_copies {
            return Err(LibraryError::invariant(format!(
                "book {id} has no check-out to revert"
            )));
        }
        book.available_copies += 1;
        Ok(book.clone())
    }

    /// Copies the ledger's committed issue count onto the book.
    ///
    /// # Errors
    /// - `InvariantViolation` when `count` is below the stored `times_issued`.
    pub(crate) fn record_issue_count(&self, id: BookId, count: u64) -> LibraryResult<Book> {
        let mut state = write_guard(&self.state);
        let book = state
            .books
            .get_mut(&id)
            .ok_or(LibraryError::NotFound(NotFoundTarget::Book(id)))?;
        if count < book.times_issued {
            return Err(LibraryError::invariant(format!(
                "issue count for book {id} would drop from {} to {count}",
                book.times_issued
            )));
        }
        book.times_issued = count;
        Ok(book.clone())
    }

    /// Drops a title; callers must have ruled out loans and reservations.
    pub(crate) fn remove(&self, id: BookId) -> LibraryResult<Book> {
        write_guard(&self.state)
            .books
            .remove(&id)
            .ok_or(LibraryError::NotFound(NotFoundTarget::Book(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::{Catalog, FIRST_BOOK_ID};
    use crate::error::LibraryError;
    use crate::model::book::{Book, NewBook};
    use crate::model::validation::MAX_TEXT_CHARS;

    fn catalog_with_one(copies: u32) -> (Catalog, u32) {
        let catalog = Catalog::new();
        let book = catalog
            .register(&NewBook::new("Clean Code", "Robert C. Martin", "Tech", copies))
            .expect("register");
        (catalog, book.id)
    }

    #[test]
    fn ids_start_at_101_and_increase() {
        let catalog = Catalog::new();
        let a = catalog.register(&NewBook::new("A", "x", "c", 1)).unwrap();
        let b = catalog.register(&NewBook::new("B", "x", "c", 1)).unwrap();
        assert_eq!(a.id, FIRST_BOOK_ID);
        assert_eq!(b.id, FIRST_BOOK_ID + 1);
        assert_eq!(catalog.next_id(), FIRST_BOOK_ID + 2);
    }

    #[test]
    fn adjust_availability_rejects_out_of_range() {
        let (catalog, id) = catalog_with_one(2);

        let err = catalog.adjust_availability(id, 1).unwrap_err();
        assert!(matches!(err, LibraryError::InvariantViolation(_)));

        catalog.adjust_availability(id, -2).expect("down to zero");
        let err = catalog.adjust_availability(id, -1).unwrap_err();
        assert!(matches!(err, LibraryError::InvariantViolation(_)));
        assert_eq!(catalog.get(id).unwrap().available_copies, 0);
    }

    #[test]
    fn check_out_and_revert_move_one_copy() {
        let (catalog, id) = catalog_with_one(1);
        let book = catalog.check_out_copy(id).unwrap();
        assert_eq!((book.available_copies, book.times_issued), (0, 0));

        assert!(catalog.check_out_copy(id).is_err());

        let book = catalog.revert_check_out(id).unwrap();
        assert_eq!(book.available_copies, 1);
        assert!(catalog.revert_check_out(id).is_err());
    }

    #[test]
    fn issue_count_never_decreases() {
        let (catalog, id) = catalog_with_one(1);
        assert_eq!(catalog.record_issue_count(id, 3).unwrap().times_issued, 3);
        assert_eq!(catalog.record_issue_count(id, 3).unwrap().times_issued, 3);

        let err = catalog.record_issue_count(id, 2).unwrap_err();
        assert!(matches!(err, LibraryError::InvariantViolation(_)));
        assert_eq!(catalog.get(id).unwrap().times_issued, 3);
    }

    #[test]
    fn restore_rejects_overlong_text() {
        let book = Book {
            id: FIRST_BOOK_ID,
            title: "t".repeat(MAX_TEXT_CHARS + 1),
            author: "a".into(),
            category: "c".into(),
            total_copies: 1,
            available_copies: 1,
            times_issued: 0,
        };
        let err = Catalog::restore(vec![book], FIRST_BOOK_ID + 1).unwrap_err();
        assert!(matches!(err, LibraryError::InvalidData(_)));
    }

    #[test]
    fn category_listing_ignores_case() {
        let catalog = Catalog::new();
        catalog.register(&NewBook::new("A", "x", "Fiction", 1)).unwrap();
        catalog.register(&NewBook::new("B", "x", "Tech", 1)).unwrap();
        catalog.register(&NewBook::new("C", "x", "fiction", 1)).unwrap();

        let titles = catalog
            .list_by_category(" FICTION ")
            .into_iter()
            .map(|book| book.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["A", "C"]);
        assert!(catalog.list_by_category("  ").is_empty());
    }
}
