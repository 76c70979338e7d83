//! Demo scenarios
//!
//! Each scenario builds its transactions once, hands them to worker threads,
//! and does all printing outside `atomically`.

use anyhow::{ensure, Context as _, Result};
use std::thread;
use std::time::Duration;
use stratastm_engine::{
    atomically, both, both_voided, modify_ret, pure, read, retry, try_bind, with_tvar,
    with_tvars3, write, Context, Stm, TVar,
};

/// Which counter values a worker acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// Odd counter values
    Odd,
    /// Even counter values
    Even,
}

impl Parity {
    /// True if `n` has this parity
    pub fn matches(self, n: i32) -> bool {
        match self {
            Parity::Odd => n % 2 != 0,
            Parity::Even => n % 2 == 0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Parity::Odd => "odd",
            Parity::Even => "even",
        }
    }
}

/// Where worker progress goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// One line per transaction on stdout
    Stdout,
    /// Nothing; only the returned report
    Silent,
}

impl Output {
    fn line(self, text: impl FnOnce() -> String) {
        if self == Output::Stdout {
            println!("{}", text());
        }
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// Increment the counter and yield the new value
pub fn increment_counter(counter: &TVar<i32>) -> Stm<i32> {
    modify_ret(counter, |n| n + 1)
}

/// Increment only if the counter has `parity`; yields the new value if so
pub fn eventual_increment(parity: Parity, counter: &TVar<i32>) -> Stm<Option<i32>> {
    let counter = *counter;
    with_tvar(&counter, move |n| {
        if parity.matches(n) {
            increment_counter(&counter).map(Some)
        } else {
            pure(None)
        }
    })
}

/// Block until the counter has `parity`, then increment it
pub fn guaranteed_increment(parity: Parity, counter: &TVar<i32>) -> Stm<i32> {
    let counter = *counter;
    with_tvar(&counter, move |n| {
        if parity.matches(n) {
            increment_counter(&counter)
        } else {
            retry()
        }
    })
}

/// Rounds after which the pair is `(F(92), F(93))`; `F(94)` overflows `u64`
pub const MAX_FIBONACCI_ROUNDS: usize = 92;

/// Advance `(f0, f1)` to `(f1, f0 + f1)` as one commit
///
/// Aborts without writing if `f0 + f1` does not fit in a `u64`.
pub fn fibonacci_step(f0: &TVar<u64>, f1: &TVar<u64>) -> Stm<()> {
    let (f0, f1) = (*f0, *f1);
    try_bind(both(read(&f0), read(&f1)), move |(a, b)| {
        let next = a
            .checked_add(b)
            .ok_or_else(|| anyhow::anyhow!("fibonacci overflow: {} + {} exceeds u64", a, b))?;
        Ok(both_voided(write(&f0, b), write(&f1, next)))
    })
}

// ============================================================================
// Counter scenarios
// ============================================================================

/// Settings for the two-worker counter scenarios
#[derive(Debug, Clone, Copy)]
pub struct CounterSettings {
    /// Transactions per worker
    pub iterations: usize,
    /// Pause between a worker's transactions
    pub interval: Duration,
    /// Progress output
    pub output: Output,
}

/// What one counter scenario observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterReport<R> {
    /// Results of the odd worker, in order
    pub odd: Vec<R>,
    /// Results of the even worker, in order
    pub even: Vec<R>,
    /// Counter value after both workers finished
    pub final_value: i32,
}

fn run_counter_workers<R, F>(
    ctx: &Context,
    counter: TVar<i32>,
    settings: CounterSettings,
    build: F,
    describe: fn(&R) -> String,
) -> Result<CounterReport<R>>
where
    R: stratastm_concurrency::TValue,
    F: Fn(Parity, &TVar<i32>) -> Stm<R>,
{
    let spawn = |parity: Parity| {
        let ctx = ctx.clone();
        let stm = build(parity, &counter);
        let settings = settings;
        thread::Builder::new()
            .name(format!("{}-worker", parity.label()))
            .spawn(move || -> Result<Vec<R>> {
                let mut seen = Vec::with_capacity(settings.iterations);
                for i in 0..settings.iterations {
                    let result = atomically(&ctx, &stm)?;
                    settings
                        .output
                        .line(|| format!("[{}] {}: {}", i, parity.label(), describe(&result)));
                    seen.push(result);
                    if i + 1 < settings.iterations {
                        thread::sleep(settings.interval);
                    }
                }
                Ok(seen)
            })
    };

    let odd = spawn(Parity::Odd).context("spawning odd worker")?;
    let even = spawn(Parity::Even).context("spawning even worker")?;

    let odd = odd
        .join()
        .map_err(|_| anyhow::anyhow!("odd worker panicked"))??;
    let even = even
        .join()
        .map_err(|_| anyhow::anyhow!("even worker panicked"))??;

    let final_value = atomically(ctx, &read(&counter))?;
    Ok(CounterReport {
        odd,
        even,
        final_value,
    })
}

/// Two workers that increment only when the parity matches
pub fn run_eventual(ctx: &Context, settings: CounterSettings) -> Result<CounterReport<Option<i32>>> {
    let counter = ctx.new_tvar(0i32);
    settings.output.line(|| "--> Eventual Counter: start.".to_string());

    let report = run_counter_workers(ctx, counter, settings, eventual_increment, |r| match r {
        Some(n) => n.to_string(),
        None => "not incremented.".to_string(),
    })?;

    settings.output.line(|| {
        format!(
            "--> Eventual Counter: threads ended. Result: {}",
            report.final_value
        )
    });
    Ok(report)
}

/// Two workers that block until the parity matches, so they alternate
pub fn run_guaranteed(ctx: &Context, settings: CounterSettings) -> Result<CounterReport<i32>> {
    let counter = ctx.new_tvar(0i32);
    settings.output.line(|| "--> Guaranteed Counter: start.".to_string());

    let report = run_counter_workers(ctx, counter, settings, guaranteed_increment, |n| {
        n.to_string()
    })?;

    ensure!(
        report.final_value == 2 * settings.iterations as i32,
        "guaranteed counter ended at {}, expected {}",
        report.final_value,
        2 * settings.iterations
    );
    settings.output.line(|| {
        format!(
            "--> Guaranteed Counter: threads ended. Result: {}",
            report.final_value
        )
    });
    Ok(report)
}

// ============================================================================
// Fibonacci scenario
// ============================================================================

/// What the Fibonacci scenario observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciReport {
    /// Committed pair after the last round
    pub final_pair: (u64, u64),
    /// Pairs the concurrent reader observed
    pub observed: usize,
    /// Observed pairs that were not two consecutive Fibonacci numbers
    pub torn: usize,
}

/// The first `count` consecutive Fibonacci pairs, starting at (0, 1)
///
/// Stops early at the last pair representable in `u64`.
pub fn fibonacci_pairs(count: usize) -> Vec<(u64, u64)> {
    let mut pairs = Vec::with_capacity(count.min(MAX_FIBONACCI_ROUNDS + 1));
    let mut pair = Some((0u64, 1u64));
    while pairs.len() < count {
        let Some((a, b)) = pair else { break };
        pairs.push((a, b));
        pair = a.checked_add(b).map(|next| (b, next));
    }
    pairs
}

/// Advance a Fibonacci pair `rounds` times while a reader samples it
pub fn run_fibonacci(ctx: &Context, rounds: usize, output: Output) -> Result<FibonacciReport> {
    ensure!(
        rounds <= MAX_FIBONACCI_ROUNDS,
        "{} fibonacci rounds requested, at most {} fit in u64",
        rounds,
        MAX_FIBONACCI_ROUNDS
    );
    let f0 = ctx.new_tvar(0u64);
    let f1 = ctx.new_tvar(1u64);
    let done = ctx.new_tvar(false);
    let valid = fibonacci_pairs(rounds + 1);

    output.line(|| "--> Fibonacci: start.".to_string());

    let reader = {
        let ctx = ctx.clone();
        let valid = valid.clone();
        let sample = with_tvars3(&f0, &f1, &done, |a, b, finished| pure((a, b, finished)));
        thread::Builder::new()
            .name("fib-reader".to_string())
            .spawn(move || -> Result<(usize, usize)> {
                let (mut observed, mut torn) = (0, 0);
                loop {
                    let (a, b, finished) = atomically(&ctx, &sample)?;
                    observed += 1;
                    if !valid.contains(&(a, b)) {
                        torn += 1;
                    }
                    if finished {
                        return Ok((observed, torn));
                    }
                    thread::yield_now();
                }
            })
            .context("spawning reader")?
    };

    let step = fibonacci_step(&f0, &f1);
    for round in 1..=rounds {
        atomically(ctx, &step)?;
        let (a, b) = atomically(ctx, &both(read(&f0), read(&f1)))?;
        output.line(|| format!("[{}] fib: ({}, {})", round, a, b));
    }
    atomically(ctx, &write(&done, true))?;

    let (observed, torn) = reader
        .join()
        .map_err(|_| anyhow::anyhow!("reader panicked"))??;
    let final_pair = atomically(ctx, &both(read(&f0), read(&f1)))?;

    output.line(|| {
        format!(
            "--> Fibonacci: ended. Result: {:?}, reader saw {} pairs, {} torn",
            final_pair, observed, torn
        )
    });
    Ok(FibonacciReport {
        final_pair,
        observed,
        torn,
    })
}
