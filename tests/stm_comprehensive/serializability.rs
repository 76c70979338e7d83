//! Serializability Tests
//!
//! Concurrent transactions behave as if they ran one at a time.

use crate::*;
use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

fn hammer(ctx: &Context, counter: TVar<u64>, threads: usize, per_thread: usize) {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let ctx = ctx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let inc = modify(&counter, |n| n + 1);
                for _ in 0..per_thread {
                    atomically(&ctx, &inc).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_concurrent_increments_lose_nothing() {
    let ctx = Context::new();
    let counter = ctx.new_tvar(0u64);
    hammer(&ctx, counter, 8, 250);
    assert_eq!(committed(&ctx, &counter), 2_000);
}

/// Two threads increment 50 times each; every value each thread observes
/// after its own increment is strictly increasing and all 100 are distinct
#[test]
fn test_increment_and_read_observations() {
    let ctx = Context::new();
    let counter = ctx.new_tvar(0u32);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ctx = ctx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let inc = modify_ret(&counter, |n| n + 1);
                (0..50)
                    .map(|_| atomically(&ctx, &inc).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = Vec::new();
    for h in handles {
        let seen = h.join().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "not increasing: {:?}", seen);
        all.extend(seen);
    }
    all.sort_unstable();
    assert_eq!(all, (1..=100).collect::<Vec<_>>());
    assert_eq!(committed(&ctx, &counter), 100);
}

/// Swapping two TVars from many threads keeps the multiset of values
#[test]
fn test_concurrent_swaps_keep_values() {
    let ctx = Context::new();
    let a = ctx.new_tvar(String::from("left"));
    let b = ctx.new_tvar(String::from("right"));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let swap = with_tvars(&a, &b, move |x, y| both_voided(write(&a, y), write(&b, x)));
                for _ in 0..101 {
                    atomically(&ctx, &swap).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // 404 swaps in total: back where we started
    let (x, y) = atomically(&ctx, &both(read(&a), read(&b))).unwrap();
    assert_eq!((x.as_str(), y.as_str()), ("left", "right"));
}

#[test]
fn test_read_your_writes_within_attempt() {
    let ctx = Context::new();
    let v = ctx.new_tvar(10i32);

    let stm = write(&v, 11)
        .then(modify_ret(&v, |n| n * 2))
        .and_then(move |doubled| read(&v).map(move |now| (doubled, now)));
    assert_eq!(atomically(&ctx, &stm).unwrap(), (22, 22));
    assert_eq!(committed(&ctx, &v), 22);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_increments_are_counted(threads in 1usize..5, per_thread in 1usize..40) {
        let ctx = Context::new();
        let counter = ctx.new_tvar(0u64);
        hammer(&ctx, counter, threads, per_thread);
        prop_assert_eq!(committed(&ctx, &counter), (threads * per_thread) as u64);
    }
}
