//! Integration tests against the public facade: a closure that panics must
//! not take the rest of the pool down with it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use tplmgr::{spawn, ThreadPoolBuilder};

fn settle() {
    sleep(Duration::from_millis(150));
}

#[test]
fn a_panicking_closure_does_not_stall_the_worker() {
    let panicked = Arc::new(AtomicUsize::new(0));
    let panicked_for_handler = Arc::clone(&panicked);

    let pool = ThreadPoolBuilder::new()
        .num_threads(2)
        .panic_handler(move |_payload| {
            panicked_for_handler.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .expect("pool should build with at least one worker");

    assert!(spawn(&pool, || panic!("deliberate test panic")));

    let completed = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let completed = Arc::clone(&completed);
        assert!(spawn(&pool, move || {
            completed.fetch_add(1, Ordering::SeqCst);
        }));
    }

    settle();
    assert_eq!(panicked.load(Ordering::SeqCst), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 10);
}

#[test]
fn default_panic_handler_still_lets_the_pool_make_progress() {
    let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();

    assert!(spawn(&pool, || panic!("no handler registered")));

    let completed = Arc::new(AtomicUsize::new(0));
    let completed_clone = Arc::clone(&completed);
    assert!(spawn(&pool, move || {
        completed_clone.fetch_add(1, Ordering::SeqCst);
    }));

    settle();
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}
