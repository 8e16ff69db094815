//! Contract tests for the entity lockers: exclusion, independence,
//! re-entrancy, timeouts, failure propagation, and map cleanup.

use lockcraft::core::EntityLocker;
use lockcraft::sync::{StripedEntityLocker, UnboundedEntityLocker};
use lockcraft::LockCraftError;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_protected_code_runs_once() {
    let locker = StripedEntityLocker::<String>::new();

    let mut calls = 0;
    locker
        .run(&"1".to_string(), || {
            calls += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(calls, 1);
}

#[test]
fn test_call_propagates_value() {
    let locker = StripedEntityLocker::<String>::new();

    let value = locker.call(&"1".to_string(), || Ok(1)).unwrap();
    assert_eq!(value, 1);
}

#[test]
fn test_distinct_ids_may_overlap() {
    let locker = Arc::new(StripedEntityLocker::<&'static str>::new());
    // Both threads must be inside their critical sections at the same time
    // to pass the barrier; serialization across distinct IDs would deadlock
    // this test instead of passing it.
    let rendezvous = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["A", "B"]
        .into_iter()
        .map(|id| {
            let locker = Arc::clone(&locker);
            let rendezvous = Arc::clone(&rendezvous);
            thread::spawn(move || {
                locker
                    .run(&id, || {
                        rendezvous.wait();
                        Ok(())
                    })
                    .unwrap();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(locker.entry_count(), 0);
}

#[test]
fn test_mutual_exclusion_per_id() {
    let locker = Arc::new(StripedEntityLocker::<u32>::new());
    let inside = Arc::new(AtomicBool::new(false));
    let executed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let locker = Arc::clone(&locker);
            let inside = Arc::clone(&inside);
            let executed = Arc::clone(&executed);
            thread::spawn(move || {
                for _ in 0..25 {
                    locker
                        .run(&0, || {
                            assert!(
                                !inside.swap(true, Ordering::SeqCst),
                                "two threads inside the same entity's critical section"
                            );
                            thread::sleep(Duration::from_micros(50));
                            inside.store(false, Ordering::SeqCst);
                            executed.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(executed.load(Ordering::SeqCst), 8 * 25);
    assert_eq!(locker.entry_count(), 0);
}

#[test]
fn test_reentrant_call_observes_program_order() {
    let locker = StripedEntityLocker::<String>::new();
    let id = "1".to_string();
    let order = std::cell::RefCell::new(Vec::new());

    locker
        .run(&id, || {
            locker.run(&id, || {
                order.borrow_mut().push("1");
                Ok(())
            })?;
            order.borrow_mut().push("2");
            Ok(())
        })
        .unwrap();

    assert_eq!(*order.borrow(), ["1", "2"]);
    assert_eq!(locker.entry_count(), 0);
}

#[test]
fn test_reentrant_call_unbounded() {
    let locker = UnboundedEntityLocker::<String>::new();
    let id = "1".to_string();
    let order = std::cell::RefCell::new(Vec::new());

    locker
        .run(&id, || {
            locker.run(&id, || {
                order.borrow_mut().push("1");
                Ok(())
            })?;
            order.borrow_mut().push("2");
            Ok(())
        })
        .unwrap();

    assert_eq!(*order.borrow(), ["1", "2"]);
}

#[test]
fn test_timeout_while_lock_is_held() {
    let locker = Arc::new(StripedEntityLocker::<String>::new());
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let holder = {
        let locker = Arc::clone(&locker);
        thread::spawn(move || {
            locker
                .run(&"X".to_string(), || {
                    held_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
                .unwrap();
        })
    };

    held_rx.recv().unwrap();

    let ran = AtomicBool::new(false);
    let result = locker.run_with_timeout(
        &"X".to_string(),
        || {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        },
        Duration::from_millis(1),
    );

    assert!(matches!(result, Err(LockCraftError::Timeout { .. })));
    assert!(!ran.load(Ordering::SeqCst), "timed-out attempt ran its protected code");

    release_tx.send(()).unwrap();
    holder.join().unwrap();

    // The timed-out attempt retired its bookkeeping; nothing leaked.
    assert_eq!(locker.entry_count(), 0);
}

#[test]
fn test_execution_failure_preserves_cause() {
    use std::error::Error;

    let locker = StripedEntityLocker::<String>::new();
    let id = "1".to_string();

    let cause: lockcraft::ProtectedError = Box::new(std::io::Error::new(
        std::io::ErrorKind::Other,
        "ledger torn",
    ));
    let result = locker.run(&id, || Err(cause));

    let err = result.unwrap_err();
    assert!(matches!(err, LockCraftError::Execution { .. }));
    let source = err.source().expect("execution failure carries its cause");
    assert_eq!(source.to_string(), "ledger torn");

    // The lock was released: a following non-blocking call succeeds.
    locker
        .run_with_timeout(&id, || Ok(()), Duration::ZERO)
        .unwrap();
    assert_eq!(locker.entry_count(), 0);
}

#[test]
fn test_invalid_stripe_count_rejected() {
    let result = StripedEntityLocker::<String>::with_stripe_count(Duration::from_secs(1), 0);
    assert!(matches!(
        result,
        Err(LockCraftError::InvalidParameters { .. })
    ));
}

#[test]
fn test_post_contention_cleanup_and_fresh_entry() {
    let locker = Arc::new(StripedEntityLocker::<u32>::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let locker = Arc::clone(&locker);
            thread::spawn(move || {
                for _ in 0..50 {
                    // Short timeout: some attempts will lose the race and
                    // time out, and must still retire cleanly.
                    let _ = locker.run_with_timeout(
                        &7,
                        || {
                            thread::sleep(Duration::from_micros(100));
                            Ok(())
                        },
                        Duration::from_micros(200),
                    );
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(locker.entry_count(), 0, "contended entry leaked");

    // A later use allocates a fresh entry and succeeds immediately.
    locker
        .run_with_timeout(&7, || Ok(()), Duration::ZERO)
        .unwrap();
}

#[test]
fn test_stress_random_timeouts() {
    let locker = Arc::new(StripedEntityLocker::<u32>::new());
    let successes = Arc::new(AtomicUsize::new(0));
    let timeouts = Arc::new(AtomicUsize::new(0));

    let threads = 8;
    let iterations = 100;

    let handles: Vec<_> = (0..threads)
        .map(|tid| {
            let locker = Arc::clone(&locker);
            let successes = Arc::clone(&successes);
            let timeouts = Arc::clone(&timeouts);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for i in 0..iterations {
                    let id = ((tid + i) % 4) as u32;
                    let timeout = Duration::from_micros(rng.gen_range(0..2_000));
                    let hold = Duration::from_micros(rng.gen_range(0..200));
                    match locker.run_with_timeout(
                        &id,
                        || {
                            thread::sleep(hold);
                            Ok(())
                        },
                        timeout,
                    ) {
                        Ok(()) => {
                            successes.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            assert!(err.is_timeout(), "unexpected failure: {err}");
                            timeouts.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(
        successes.load(Ordering::Relaxed) + timeouts.load(Ordering::Relaxed),
        threads * iterations
    );

    // No live entries, and every entity lock is free again.
    assert_eq!(locker.entry_count(), 0);
    for id in 0..4 {
        locker
            .run_with_timeout(&id, || Ok(()), Duration::ZERO)
            .unwrap();
    }
}

#[test]
fn test_two_lockers_are_independent() {
    let first = Arc::new(StripedEntityLocker::<&'static str>::new());
    let second = Arc::new(StripedEntityLocker::<&'static str>::new());
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let holder = {
        let first = Arc::clone(&first);
        thread::spawn(move || {
            first
                .run(&"shared-id", || {
                    held_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
                .unwrap();
        })
    };

    held_rx.recv().unwrap();
    // A different locker instance never shares entries; the same ID is free.
    second
        .run_with_timeout(&"shared-id", || Ok(()), Duration::ZERO)
        .unwrap();

    release_tx.send(()).unwrap();
    holder.join().unwrap();
}

#[test]
fn test_sequential_effects_are_ordered() {
    let locker = Arc::new(StripedEntityLocker::<u32>::new());
    let journal = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..4)
        .map(|tid| {
            let locker = Arc::clone(&locker);
            let journal = Arc::clone(&journal);
            thread::spawn(move || {
                for i in 0..25 {
                    locker
                        .run(&1, || {
                            journal.lock().unwrap().push((tid, i));
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let journal = journal.lock().unwrap();
    assert_eq!(journal.len(), 100);
    // Per-thread order is preserved because each append happens under the
    // entity's lock on the appending thread.
    for tid in 0..4 {
        let seen: Vec<_> = journal.iter().filter(|(t, _)| *t == tid).map(|(_, i)| *i).collect();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
    }
}
