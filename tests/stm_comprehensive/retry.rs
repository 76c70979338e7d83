//! Blocking Retry Tests
//!
//! A description that reaches `retry` commits only once its condition holds,
//! and sleeps until a TVar it read is written.

use crate::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn wait_until_blocked(ctx: &Context, count: u64) {
    while ctx.metrics().waiting < count {
        thread::yield_now();
    }
}

#[test]
fn test_guard_commits_only_when_condition_holds() {
    let ctx = quiet_context();
    let v = ctx.new_tvar(0u32);

    let waiter = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            // Take the value once it reaches 3
            let take = with_tvar(&v, move |n| guard(n >= 3).then(write(&v, 100).then(pure(n))));
            atomically(&ctx, &take).unwrap()
        })
    };

    for _ in 0..3 {
        wait_until_blocked(&ctx, 1);
        atomically(&ctx, &modify(&v, |n| n + 1)).unwrap();
    }

    assert_eq!(waiter.join().unwrap(), 3);
    assert_eq!(committed(&ctx, &v), 100);
    assert!(ctx.metrics().wakeups >= 1);
}

#[test]
fn test_unrelated_write_does_not_satisfy_retry() {
    let ctx = quiet_context();
    let flag = ctx.new_tvar(false);
    let other = ctx.new_tvar(0u8);

    let waiter = {
        let ctx = ctx.clone();
        thread::spawn(move || atomically(&ctx, &with_tvar(&flag, |f| guard(f))).unwrap())
    };

    wait_until_blocked(&ctx, 1);
    atomically(&ctx, &write(&other, 1)).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ctx.metrics().waiting, 1);
    assert!(!waiter.is_finished());

    atomically(&ctx, &write(&flag, true)).unwrap();
    waiter.join().unwrap();
}

/// Bounded queue: consumers retry when empty, producers when full
#[test]
fn test_bounded_queue_producer_consumer() {
    const CAPACITY: usize = 4;
    const ITEMS: u32 = 200;

    let ctx = quiet_context();
    let queue = ctx.new_tvar(Vec::<u32>::new());

    let push = move |item: u32| {
        with_tvar(&queue, move |mut q| {
            if q.len() >= CAPACITY {
                return retry();
            }
            q.push(item);
            write(&queue, q)
        })
    };
    let pop = with_tvar(&queue, move |mut q| {
        if q.is_empty() {
            return retry();
        }
        let item = q.remove(0);
        write(&queue, q).then(pure(item))
    });

    let barrier = Arc::new(Barrier::new(2));
    let consumer = {
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            (0..ITEMS)
                .map(|_| atomically(&ctx, &pop).unwrap())
                .collect::<Vec<_>>()
        })
    };

    barrier.wait();
    for item in 0..ITEMS {
        atomically(&ctx, &push(item)).unwrap();
    }

    let received = consumer.join().unwrap();
    assert_eq!(received, (0..ITEMS).collect::<Vec<_>>());
    assert!(committed(&ctx, &queue).is_empty());
}

/// One commit wakes every waiter that read the written TVar
#[test]
fn test_commit_wakes_all_waiters() {
    let ctx = quiet_context();
    let gate = ctx.new_tvar(false);

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let ctx = ctx.clone();
            thread::spawn(move || atomically(&ctx, &with_tvar(&gate, |open| guard(open))).unwrap())
        })
        .collect();

    wait_until_blocked(&ctx, 3);
    atomically(&ctx, &write(&gate, true)).unwrap();
    for w in waiters {
        w.join().unwrap();
    }
    assert_eq!(ctx.metrics().waiting, 0);
}

/// Guaranteed alternation: two workers take turns on a shared counter
#[test]
fn test_parity_workers_alternate() {
    let ctx = quiet_context();
    let counter = ctx.new_tvar(0u32);

    let worker = |want_odd: bool| {
        let ctx = ctx.clone();
        thread::spawn(move || {
            let step = with_tvar(&counter, move |n| {
                guard((n % 2 == 1) == want_odd).then(modify_ret(&counter, |n| n + 1))
            });
            (0..25)
                .map(|_| atomically(&ctx, &step).unwrap())
                .collect::<Vec<_>>()
        })
    };

    let even = worker(false);
    let odd = worker(true);
    let even = even.join().unwrap();
    let odd = odd.join().unwrap();

    assert_eq!(even, (0..25).map(|i| 2 * i + 1).collect::<Vec<_>>());
    assert_eq!(odd, (1..=25).map(|i| 2 * i).collect::<Vec<_>>());
    assert_eq!(committed(&ctx, &counter), 50);
}

#[test]
fn test_watchdog_warns_while_blocked() {
    let ctx = Context::builder()
        .starvation_threshold(Duration::from_millis(5))
        .build();
    let flag = ctx.new_tvar(false);

    let waiter = {
        let ctx = ctx.clone();
        thread::spawn(move || atomically(&ctx, &with_tvar(&flag, |f| guard(f))).unwrap())
    };

    wait_until_blocked(&ctx, 1);
    while ctx.metrics().starvation_warnings == 0 {
        thread::sleep(Duration::from_millis(2));
    }
    atomically(&ctx, &write(&flag, true)).unwrap();
    waiter.join().unwrap();
    assert!(ctx.metrics().starvation_warnings >= 1);
}
