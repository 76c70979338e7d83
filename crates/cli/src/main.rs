//! stratastm CLI: demo scenarios for the transactional memory engine.
//!
//! - `stratastm eventual`: workers increment a shared counter when its parity matches
//! - `stratastm guaranteed`: workers block in `retry` until the parity matches
//! - `stratastm fibonacci`: a Fibonacci pair advanced atomically under a concurrent reader
//! - `stratastm` / `stratastm all`: everything, with default settings

mod commands;
mod scenarios;

use std::process;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::ArgMatches;
use stratastm_engine::{Context, StmConfig};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use scenarios::{run_eventual, run_fibonacci, run_guaranteed, CounterSettings, Output};

fn main() {
    let matches = build_cli().get_matches();

    init_logging(&matches);

    if let Err(e) = run(&matches) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(matches: &ArgMatches) {
    let level = matches
        .get_one::<String>("log-level")
        .map(|s| s.as_str())
        .unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn load_config(matches: &ArgMatches) -> Result<StmConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path))?;
            StmConfig::from_toml_str(&text).with_context(|| format!("parsing {}", path))
        }
        None => Ok(StmConfig::default()),
    }
}

fn counter_settings(sub: &ArgMatches, output: Output) -> CounterSettings {
    CounterSettings {
        iterations: sub.get_one::<usize>("iterations").copied().unwrap_or(25),
        interval: Duration::from_micros(sub.get_one::<u64>("interval-us").copied().unwrap_or(300)),
        output,
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let output = if matches.get_flag("quiet") {
        Output::Silent
    } else {
        Output::Stdout
    };

    let ctx = Context::with_config(config);

    match matches.subcommand() {
        Some(("eventual", sub)) => {
            let report = run_eventual(&ctx, counter_settings(sub, output))?;
            println!("eventual: {}", report.final_value);
        }
        Some(("guaranteed", sub)) => {
            let report = run_guaranteed(&ctx, counter_settings(sub, output))?;
            println!("guaranteed: {}", report.final_value);
        }
        Some(("fibonacci", sub)) => {
            let rounds = sub.get_one::<u64>("rounds").copied().unwrap_or(10);
            let rounds = usize::try_from(rounds).context("--rounds out of range")?;
            let report = run_fibonacci(&ctx, rounds, output)?;
            println!(
                "fibonacci: {:?} ({} reads, {} torn)",
                report.final_pair, report.observed, report.torn
            );
        }
        _ => run_all(&ctx, output)?,
    }

    let metrics = ctx.metrics();
    tracing::info!(
        commits = metrics.commits,
        conflicts = metrics.conflicts,
        blocked = metrics.blocked_retries,
        commit_rate = metrics.commit_rate(),
        "Context metrics"
    );
    Ok(())
}

fn run_all(ctx: &Context, output: Output) -> Result<()> {
    let eventual = run_eventual(
        ctx,
        CounterSettings {
            iterations: 25,
            interval: Duration::from_micros(300),
            output,
        },
    )?;
    let guaranteed = run_guaranteed(
        ctx,
        CounterSettings {
            iterations: 25,
            interval: Duration::from_micros(400),
            output,
        },
    )?;
    let fibonacci = run_fibonacci(ctx, 10, output)?;

    println!("eventual: {}", eventual.final_value);
    println!("guaranteed: {}", guaranteed.final_value);
    println!("fibonacci: {:?}", fibonacci.final_pair);
    Ok(())
}
