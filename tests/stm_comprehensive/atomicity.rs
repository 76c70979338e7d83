//! Atomicity Tests
//!
//! Writes of one `atomically` call, including those joined with `both`,
//! become visible together or not at all.

use crate::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Barrier};
use std::thread;

/// Writer keeps A == B; readers must never see them differ
#[test]
fn test_both_writes_land_together() {
    let ctx = Context::new();
    let a = ctx.new_tvar(0u64);
    let b = ctx.new_tvar(0u64);

    const ROUNDS: u64 = 500;
    const READERS: usize = 4;

    let barrier = Arc::new(Barrier::new(READERS + 1));
    let done = ctx.new_tvar(false);

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let ctx = ctx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let sample = with_tvars3(&a, &b, &done, |x, y, d| pure((x, y, d)));
                let mut samples = 0;
                loop {
                    let (x, y, finished) = atomically(&ctx, &sample).unwrap();
                    assert_eq!(x, y, "observed A={} B={}", x, y);
                    samples += 1;
                    if finished {
                        return samples;
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    let step = with_tvars(&a, &b, move |x, y| both_voided(write(&a, x + 1), write(&b, y + 1)));
    for _ in 0..ROUNDS {
        atomically(&ctx, &step).unwrap();
    }
    atomically(&ctx, &write(&done, true)).unwrap();

    for r in readers {
        assert!(r.join().unwrap() >= 1);
    }
    assert_eq!(committed(&ctx, &a), ROUNDS);
    assert_eq!(committed(&ctx, &b), ROUNDS);
}

/// Fibonacci pair advanced by `both`: no reader sees round k's f0 with round k-1's f1
#[test]
fn test_fibonacci_pair_never_torn() {
    let ctx = Context::new();
    let f0 = ctx.new_tvar(0u64);
    let f1 = ctx.new_tvar(1u64);
    let done = ctx.new_tvar(false);

    let mut valid = vec![(0u64, 1u64)];
    for _ in 0..10 {
        let (x, y) = *valid.last().unwrap();
        valid.push((y, x + y));
    }

    let reader = {
        let ctx = ctx.clone();
        let valid = valid.clone();
        thread::spawn(move || loop {
            let (x, y, finished) =
                atomically(&ctx, &with_tvars3(&f0, &f1, &done, |x, y, d| pure((x, y, d)))).unwrap();
            assert!(valid.contains(&(x, y)), "torn pair ({}, {})", x, y);
            if finished {
                break;
            }
        })
    };

    let step = with_tvars(&f0, &f1, move |x, y| both_voided(write(&f0, y), write(&f1, x + y)));
    for _ in 0..10 {
        atomically(&ctx, &step).unwrap();
    }
    atomically(&ctx, &write(&done, true)).unwrap();
    reader.join().unwrap();

    // 10th Fibonacci pair
    assert_eq!(committed(&ctx, &f0), 55);
    assert_eq!(committed(&ctx, &f1), 89);
}

/// Transfers between accounts preserve the total at every observed commit
#[test]
fn test_transfers_preserve_total() {
    let ctx = Context::new();
    let accounts: Vec<TVar<i64>> = (0..4).map(|_| ctx.new_tvar(1_000i64)).collect();
    let total: i64 = 4_000;

    const WORKERS: usize = 4;
    const TRANSFERS: usize = 200;

    let barrier = Arc::new(Barrier::new(WORKERS + 1));
    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let ctx = ctx.clone();
            let accounts = accounts.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(w as u64);
                barrier.wait();
                for _ in 0..TRANSFERS {
                    let from_idx = rng.gen_range(0..accounts.len());
                    let to_idx = (from_idx + rng.gen_range(1..accounts.len())) % accounts.len();
                    let (from, to) = (accounts[from_idx], accounts[to_idx]);
                    let amount: i64 = rng.gen_range(1..=50);
                    let transfer = with_tvars(&from, &to, move |x, y| {
                        both_voided(write(&from, x - amount), write(&to, y + amount))
                    });
                    atomically(&ctx, &transfer).unwrap();
                }
            })
        })
        .collect();

    barrier.wait();
    let audit = accounts
        .iter()
        .map(read)
        .fold(pure(0i64), |acc, r| acc.zip(r).map(|(s, v)| s + v));
    for _ in 0..200 {
        assert_eq!(atomically(&ctx, &audit).unwrap(), total);
    }

    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(atomically(&ctx, &audit).unwrap(), total);
}

/// A failing second half discards the first half's writes
#[test]
fn test_failed_both_commits_nothing() {
    let ctx = Context::new();
    let a = ctx.new_tvar(1i32);
    let b = ctx.new_tvar(1i32);

    let stm = both_voided(
        write(&a, 2),
        try_modify(&b, |_| Err(anyhow::anyhow!("second half fails"))),
    );
    assert!(atomically(&ctx, &stm).unwrap_err().is_aborted());
    assert_eq!(committed(&ctx, &a), 1);
    assert_eq!(committed(&ctx, &b), 1);
}
