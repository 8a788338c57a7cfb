use libris_core::{CirculationEngine, LibraryConfig, LibraryError, ManualClock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn library() -> CirculationEngine {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    CirculationEngine::with_clock(LibraryConfig::default(), clock).unwrap()
}

fn members(engine: &CirculationEngine, count: usize) -> Vec<u32> {
    (0..count)
        .map(|i| {
            engine
                .register_member(&format!("Member {i}"), &format!("m{i}@example.com"), "9876543210")
                .unwrap()
                .id
        })
        .collect()
}

#[test]
fn parallel_issue_and_return_keep_copy_accounting() {
    let engine = library();
    let books = (0..6)
        .map(|i| {
            engine
                .register_book(&format!("Title {i}"), "Author", "General", 3)
                .unwrap()
                .id
        })
        .collect::<Vec<_>>();
    let member_ids = members(&engine, 12);
    let workers = 8;
    let barrier = Barrier::new(workers + 1);
    let done = AtomicBool::new(false);
    let issued = AtomicUsize::new(0);

    thread::scope(|scope| {
        let auditor = scope.spawn(|| {
            barrier.wait();
            let mut audits = 0usize;
            while !done.load(Ordering::Acquire) {
                engine.verify_copy_accounting().unwrap();
                audits += 1;
                thread::yield_now();
            }
            audits
        });

        let handles = (0..workers)
            .map(|worker| {
                let (engine, books, member_ids) = (&engine, &books, &member_ids);
                let (barrier, issued) = (&barrier, &issued);
                scope.spawn(move || {
                    barrier.wait();
                    for round in 0..200 {
                        let book_id = books[(worker + round) % books.len()];
                        let member_id = member_ids[(worker * 7 + round) % member_ids.len()];
                        match engine.issue_book(book_id, member_id) {
                            Ok(_) => {
                                issued.fetch_add(1, Ordering::Relaxed);
                                if round % 3 != 0 {
                                    // Another worker may share this member and return first.
                                    let _ = engine.return_book(book_id, member_id);
                                }
                            }
                            Err(LibraryError::Unavailable { .. })
                            | Err(LibraryError::DuplicateLoan { .. }) => {
                                let _ = engine.return_book(book_id, member_id);
                            }
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        done.store(true, Ordering::Release);
        assert!(auditor.join().unwrap() >= 1);
    });

    engine.verify_copy_accounting().unwrap();
    let snapshot = engine.snapshot();
    let active = snapshot.loans.iter().filter(|loan| loan.is_active()).count();
    let on_loan: u32 = snapshot.books.iter().map(|book| book.copies_on_loan()).sum();
    assert_eq!(active, on_loan as usize);
    let total_issues: u64 = snapshot.books.iter().map(|book| book.times_issued).sum();
    assert_eq!(total_issues, issued.load(Ordering::Relaxed) as u64);
}

#[test]
fn racing_walk_ins_cannot_share_one_copy() {
    for _ in 0..50 {
        let engine = library();
        let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 1).unwrap();
        let ids = members(&engine, 2);
        let barrier = Barrier::new(2);

        let outcomes = thread::scope(|scope| {
            let handles = ids
                .iter()
                .map(|member_id| {
                    let (engine, barrier) = (&engine, &barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        engine.issue_book(book.id, *member_id)
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|outcome| matches!(outcome, Err(LibraryError::Unavailable { .. }))));
        assert_eq!(engine.get_book(book.id).unwrap().available_copies, 0);
    }
}

#[test]
fn freed_copy_goes_only_to_queue_head_under_contention() {
    for _ in 0..50 {
        let engine = library();
        let book = engine.register_book("Sapiens", "Yuval Noah Harari", "History", 1).unwrap();
        let ids = members(&engine, 3);
        engine.issue_book(book.id, ids[0]).unwrap();
        engine.reserve_book(book.id, ids[1]).unwrap();
        engine.reserve_book(book.id, ids[2]).unwrap();
        engine.return_book(book.id, ids[0]).unwrap();

        let barrier = Barrier::new(3);
        let (head, second, walk_in) = thread::scope(|scope| {
            let claim = |member_id: u32| {
                let (engine, barrier) = (&engine, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    engine.issue_book(book.id, member_id)
                })
            };
            let head = claim(ids[1]);
            let second = claim(ids[2]);
            let walk_in = claim(ids[0]);
            (
                head.join().unwrap(),
                second.join().unwrap(),
                walk_in.join().unwrap(),
            )
        });

        assert!(head.unwrap().from_reservation);
        assert!(matches!(second, Err(LibraryError::Unavailable { .. })));
        assert!(matches!(walk_in, Err(LibraryError::Unavailable { .. })));
        let queue = engine.list_reservations_for_book(book.id).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].member_id, ids[2]);
    }
}

#[test]
fn snapshot_during_traffic_is_consistent() {
    let engine = library();
    let book = engine.register_book("Clean Code", "Robert C. Martin", "Tech", 2).unwrap();
    let ids = members(&engine, 4);

    thread::scope(|scope| {
        for member_id in &ids {
            let engine = &engine;
            scope.spawn(move || {
                for _ in 0..100 {
                    if engine.issue_book(book.id, *member_id).is_ok() {
                        engine.return_book(book.id, *member_id).unwrap();
                    }
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..100 {
                let snapshot = engine.snapshot();
                let active = snapshot.loans.iter().filter(|loan| loan.is_active()).count() as u32;
                assert_eq!(snapshot.books[0].available_copies + active, 2);
            }
        });
    });
}
