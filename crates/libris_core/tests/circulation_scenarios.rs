use libris_core::{
    CirculationEngine, LibraryConfig, LibraryError, ManualClock, NotFoundTarget, ValidationError,
};
use libris_core::config::MS_PER_DAY;
use std::sync::Arc;

const START_MS: i64 = 1_700_000_000_000;

fn library() -> (CirculationEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let engine = CirculationEngine::with_clock(LibraryConfig::default(), clock.clone()).unwrap();
    (engine, clock)
}

fn member(engine: &CirculationEngine, name: &str) -> u32 {
    let email = format!("{}@example.com", name.to_lowercase());
    engine.register_member(name, &email, "9876543210").unwrap().id
}

#[test]
fn ids_are_sequential_from_their_bases() {
    let (engine, _) = library();
    let first = engine.register_book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 5).unwrap();
    let second = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 3).unwrap();
    assert_eq!((first.id, second.id), (101, 102));
    assert_eq!(member(&engine, "Asha"), 1);
    assert_eq!(member(&engine, "Ben"), 2);
}

#[test]
fn single_copy_passes_to_reserving_member() {
    let (engine, _) = library();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
    let m1 = member(&engine, "Asha");
    let m2 = member(&engine, "Ben");
    let m3 = member(&engine, "Chen");

    engine.issue_book(book.id, m1).unwrap();
    let reserved = engine.reserve_book(book.id, m2).unwrap();
    assert_eq!(reserved.position, 1);
    assert_eq!(reserved.to_string(), "Reserved successfully. Queue position: 1");

    let returned = engine.return_book(book.id, m1).unwrap();
    assert_eq!(returned.held_for, Some(m2));
    assert_eq!(
        returned.to_string(),
        format!("Book returned; held for reservation (member {m2}).")
    );

    // The held copy is not free for a walk-in.
    assert!(matches!(
        engine.issue_book(book.id, m3),
        Err(LibraryError::Unavailable { .. })
    ));

    let claimed = engine.issue_book(book.id, m2).unwrap();
    assert!(claimed.from_reservation);
    assert!(engine.list_reservations_for_book(book.id).unwrap().is_empty());
    assert!(engine.get_member_details(m2).unwrap().reservations.is_empty());

    assert!(matches!(
        engine.issue_book(book.id, m3),
        Err(LibraryError::Unavailable { book_id }) if book_id == book.id
    ));
    engine.verify_copy_accounting().unwrap();
}

#[test]
fn reservations_are_claimed_first_in_first_out() {
    let (engine, _) = library();
    let book = engine.register_book("Data Structures", "Robert Lafore", "Education", 1).unwrap();
    let holder = member(&engine, "Holder");
    let a = member(&engine, "Ann");
    let b = member(&engine, "Bob");
    let c = member(&engine, "Cat");

    engine.issue_book(book.id, holder).unwrap();
    for (expected, id) in [(1, a), (2, b), (3, c)] {
        assert_eq!(engine.reserve_book(book.id, id).unwrap().position, expected);
    }

    engine.return_book(book.id, holder).unwrap();
    for (claimant, others) in [(a, vec![b, c]), (b, vec![c]), (c, vec![])] {
        for other in others {
            assert!(matches!(
                engine.issue_book(book.id, other),
                Err(LibraryError::Unavailable { .. })
            ));
        }
        assert!(engine.issue_book(book.id, claimant).unwrap().from_reservation);
        engine.return_book(book.id, claimant).unwrap();
    }
    assert!(engine.list_reservations().is_empty());
}

#[test]
fn issue_and_return_track_counts() {
    let (engine, _) = library();
    let book = engine.register_book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 5).unwrap();
    let asha = member(&engine, "Asha");

    let issued = engine.issue_book(book.id, asha).unwrap();
    assert_eq!(issued.book.available_copies, 4);
    assert_eq!(issued.book.times_issued, 1);
    assert_eq!(issued.loan.due_date - issued.loan.issue_date, 14 * MS_PER_DAY);

    assert!(matches!(
        engine.issue_book(book.id, asha),
        Err(LibraryError::DuplicateLoan { .. })
    ));

    let returned = engine.return_book(book.id, asha).unwrap();
    assert_eq!(returned.book.available_copies, 5);
    assert_eq!(returned.book.times_issued, 1);
    assert!(returned.loan.return_date.is_some());
    assert_eq!(returned.to_string(), "Book returned successfully.");

    assert!(matches!(
        engine.return_book(book.id, asha),
        Err(LibraryError::NoSuchLoan { .. })
    ));
}

#[test]
fn unknown_entities_are_not_found() {
    let (engine, _) = library();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
    let asha = member(&engine, "Asha");

    assert!(matches!(
        engine.issue_book(999, asha),
        Err(LibraryError::NotFound(NotFoundTarget::Book(999)))
    ));
    assert!(matches!(
        engine.issue_book(book.id, 42),
        Err(LibraryError::NotFound(NotFoundTarget::Member(42)))
    ));
    assert!(matches!(
        engine.get_member_details(42),
        Err(LibraryError::NotFound(NotFoundTarget::Member(42)))
    ));
}

#[test]
fn reserve_rules() {
    let (engine, _) = library();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
    let asha = member(&engine, "Asha");
    let ben = member(&engine, "Ben");

    assert!(matches!(
        engine.reserve_book(book.id, asha),
        Err(LibraryError::UnavailableForReservation { free_copies: 1, .. })
    ));

    engine.issue_book(book.id, asha).unwrap();
    assert!(matches!(
        engine.reserve_book(book.id, asha),
        Err(LibraryError::DuplicateLoan { .. })
    ));

    engine.reserve_book(book.id, ben).unwrap();
    assert!(matches!(
        engine.reserve_book(book.id, ben),
        Err(LibraryError::AlreadyReserved { .. })
    ));
}

#[test]
fn full_queue_rejects_new_reservations() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let config = LibraryConfig {
        reservation_queue_capacity: 2,
        ..LibraryConfig::default()
    };
    let engine = CirculationEngine::with_clock(config, clock).unwrap();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
    let ids = ["Asha", "Ben", "Chen", "Dev"].map(|name| member(&engine, name));

    engine.issue_book(book.id, ids[0]).unwrap();
    engine.reserve_book(book.id, ids[1]).unwrap();
    engine.reserve_book(book.id, ids[2]).unwrap();
    assert!(matches!(
        engine.reserve_book(book.id, ids[3]),
        Err(LibraryError::QueueFull { capacity: 2, .. })
    ));
}

#[test]
fn cancelling_missing_reservation_changes_nothing() {
    let (engine, _) = library();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
    let asha = member(&engine, "Asha");
    let ben = member(&engine, "Ben");
    let chen = member(&engine, "Chen");
    engine.issue_book(book.id, asha).unwrap();
    engine.reserve_book(book.id, ben).unwrap();

    let before = engine.snapshot();
    assert!(matches!(
        engine.cancel_reservation(book.id, chen),
        Err(LibraryError::NotFound(NotFoundTarget::Reservation { .. }))
    ));
    assert_eq!(engine.snapshot(), before);

    engine.cancel_reservation(book.id, ben).unwrap();
    assert!(engine.list_reservations().is_empty());
    // With the queue gone the copy returned next is free again.
    engine.return_book(book.id, asha).unwrap();
    engine.issue_book(book.id, chen).unwrap();
}

#[test]
fn overdue_report_ranks_and_fines() {
    let (engine, clock) = library();
    let gatsby = engine.register_book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 5).unwrap();
    let code = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 3).unwrap();
    let asha = member(&engine, "Asha");
    let ben = member(&engine, "Ben");

    let first = engine.issue_book(gatsby.id, asha).unwrap();
    clock.advance(2 * MS_PER_DAY);
    engine.issue_book(code.id, ben).unwrap();

    // Exactly at the due instant nothing is overdue.
    assert!(engine.overdue_report(first.loan.due_date).is_empty());

    let now = first.loan.due_date + 7 * MS_PER_DAY;
    let report = engine.overdue_report(now);
    assert_eq!(report.len(), 2);
    assert_eq!((report[0].book_id, report[0].days_overdue, report[0].fine), (gatsby.id, 7, 35));
    assert_eq!((report[1].book_id, report[1].days_overdue, report[1].fine), (code.id, 5, 25));
    assert_eq!(engine.total_outstanding_fines(now), 60);

    let lines = engine.overdue_report_lines(now).unwrap();
    assert_eq!(lines[0].book_title, "The Great Gatsby");
    assert_eq!(lines[0].member_name, "Asha");

    clock.set(now);
    let details = engine.get_member_details(asha).unwrap();
    assert_eq!(details.issued_books.len(), 1);
    assert!(details.issued_books[0].is_overdue);
}

#[test]
fn phone_validation() {
    let (engine, _) = library();
    assert!(matches!(
        engine.register_member("Asha", "asha@example.com", "12345"),
        Err(LibraryError::Validation(ValidationError::InvalidPhone(_)))
    ));
    assert!(engine
        .register_member("Asha", "asha@example.com", "9876543210")
        .is_ok());
    assert_eq!(engine.list_members().len(), 1);
}

#[test]
fn book_validation() {
    let (engine, _) = library();
    assert!(matches!(
        engine.register_book("  ", "Anon", "Misc", 1),
        Err(LibraryError::Validation(ValidationError::BlankField("title")))
    ));
    assert!(matches!(
        engine.register_book("Title", "Anon", "Misc", 0),
        Err(LibraryError::Validation(ValidationError::InvalidCopyCount(0)))
    ));
    assert!(engine.list_books().is_empty());
}

#[test]
fn sample_data_and_category_listing() {
    let (engine, _) = library();
    let books = engine.load_sample_books().unwrap();
    let members = engine.load_sample_members().unwrap();
    assert!(books.len() >= 3);
    assert!(!members.is_empty());
    assert_eq!(books[0].title, "The Great Gatsby");
    assert_eq!(books[0].total_copies, 5);

    let tech = engine.list_books_by_category("tech");
    assert!(tech.iter().all(|book| book.category == "Tech"));
    assert!(tech.iter().any(|book| book.title == "Clean Code"));
}

#[test]
fn removing_a_reserved_book_is_blocked() {
    let (engine, _) = library();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
    let asha = member(&engine, "Asha");
    let ben = member(&engine, "Ben");
    engine.issue_book(book.id, asha).unwrap();
    engine.reserve_book(book.id, ben).unwrap();
    engine.return_book(book.id, asha).unwrap();

    assert!(matches!(
        engine.remove_book(book.id),
        Err(LibraryError::BookInUse { active_loans: 0, pending_reservations: 1, .. })
    ));
    engine.cancel_reservation(book.id, ben).unwrap();
    engine.remove_book(book.id).unwrap();
    assert!(matches!(
        engine.get_book(book.id),
        Err(LibraryError::NotFound(NotFoundTarget::Book(_)))
    ));
}
