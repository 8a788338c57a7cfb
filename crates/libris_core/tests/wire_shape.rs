use libris_core::{CirculationEngine, LibraryConfig, ManualClock};
use libris_core::config::MS_PER_DAY;
use serde_json::json;
use std::sync::Arc;

const START_MS: i64 = 1_700_000_000_000;

#[test]
fn book_and_member_use_snake_case_fields() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let engine = CirculationEngine::with_clock(LibraryConfig::default(), clock).unwrap();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 3).unwrap();
    let member = engine
        .register_member("Asha", "asha@example.com", "9876543210")
        .unwrap();

    assert_eq!(
        serde_json::to_value(&book).unwrap(),
        json!({
            "id": 101,
            "title": "Clean Code",
            "author": "Robert C. Martin",
            "category": "Tech",
            "total_copies": 3,
            "available_copies": 3,
            "times_issued": 0
        })
    );
    assert_eq!(
        serde_json::to_value(&member).unwrap(),
        json!({
            "id": 1,
            "name": "Asha",
            "email": "asha@example.com",
            "phone": "9876543210",
            "registration_date": START_MS
        })
    );
}

#[test]
fn overdue_line_flattens_the_record() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let engine = CirculationEngine::with_clock(LibraryConfig::default(), clock).unwrap();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
    let member = engine
        .register_member("Asha", "asha@example.com", "9876543210")
        .unwrap();
    let loan = engine.issue_book(book.id, member.id).unwrap().loan;

    let lines = engine
        .overdue_report_lines(loan.due_date + 2 * MS_PER_DAY)
        .unwrap();
    assert_eq!(
        serde_json::to_value(&lines[0]).unwrap(),
        json!({
            "book_id": 101,
            "member_id": 1,
            "due_date": loan.due_date,
            "days_overdue": 2,
            "fine": 10,
            "book_title": "Clean Code",
            "member_name": "Asha"
        })
    );
}

#[test]
fn snapshot_round_trips_through_json() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let engine = CirculationEngine::with_clock(LibraryConfig::default(), clock).unwrap();
    engine.load_sample_books().unwrap();
    engine.load_sample_members().unwrap();
    engine.issue_book(101, 1).unwrap();

    let snapshot = engine.snapshot();
    let text = serde_json::to_string(&snapshot).unwrap();
    let decoded: libris_core::LibrarySnapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, snapshot);
}
