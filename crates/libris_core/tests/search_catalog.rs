use libris_core::{CirculationEngine, LibraryConfig, ManualClock};
use std::sync::Arc;

fn seeded() -> CirculationEngine {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let engine = CirculationEngine::with_clock(LibraryConfig::default(), clock).unwrap();
    engine.load_sample_books().unwrap();
    engine
}

fn titles(books: &[libris_core::Book]) -> Vec<&str> {
    books.iter().map(|book| book.title.as_str()).collect()
}

#[test]
fn title_search_is_case_insensitive() {
    let engine = seeded();
    assert_eq!(titles(&engine.search_books("GATSBY")), vec!["The Great Gatsby"]);
    assert_eq!(titles(&engine.search_books("clean")), vec!["Clean Code"]);
}

#[test]
fn prefix_hits_rank_before_substring_hits() {
    let engine = seeded();
    let clean = engine.register_book("Code Complete", "Steve McConnell", "Tech", 1).unwrap();
    let hits = engine.search_books("code");
    assert_eq!(hits[0].id, clean.id);
    assert!(titles(&hits).contains(&"Clean Code"));
}

#[test]
fn author_and_id_queries_match() {
    let engine = seeded();
    assert_eq!(titles(&engine.search_books("lafore")), vec!["Data Structures"]);
    let by_id = engine.search_books("102");
    assert_eq!(by_id[0].id, 102);
}

#[test]
fn hits_carry_live_copy_counts() {
    let engine = seeded();
    let member = engine
        .register_member("Asha", "asha@example.com", "9876543210")
        .unwrap();
    engine.issue_book(101, member.id).unwrap();
    let hit = &engine.search_books("gatsby")[0];
    assert_eq!(hit.available_copies, hit.total_copies - 1);
}

#[test]
fn unmatched_and_blank_queries_are_empty() {
    let engine = seeded();
    assert!(engine.search_books("no such title").is_empty());
    assert!(engine.search_books("").is_empty());
    assert!(engine.search_books("   ").is_empty());
}

#[test]
fn removed_books_leave_the_index() {
    let engine = seeded();
    engine.remove_book(103).unwrap();
    assert!(engine.search_books("data structures").is_empty());
    assert!(engine.search_books("103").is_empty());
}
