//! Command-line definition.

use clap::{value_parser, Arg, ArgAction, Command};

use crate::scenarios::MAX_FIBONACCI_ROUNDS;

/// Default iterations per counter worker
pub const DEFAULT_ITERATIONS: &str = "25";
/// Default Fibonacci rounds
pub const DEFAULT_ROUNDS: &str = "10";

fn iterations_arg() -> Arg {
    Arg::new("iterations")
        .long("iterations")
        .short('n')
        .value_parser(value_parser!(usize))
        .default_value(DEFAULT_ITERATIONS)
        .help("Transactions each worker runs")
}

fn interval_arg(default: &'static str) -> Arg {
    Arg::new("interval-us")
        .long("interval-us")
        .value_parser(value_parser!(u64))
        .default_value(default)
        .help("Pause between a worker's transactions, in microseconds")
}

fn rounds_arg() -> Arg {
    Arg::new("rounds")
        .long("rounds")
        .value_parser(value_parser!(u64).range(..=MAX_FIBONACCI_ROUNDS as u64))
        .default_value(DEFAULT_ROUNDS)
        .help("Fibonacci rounds to commit")
}

/// Build the `stratastm` command.
pub fn build_cli() -> Command {
    Command::new("stratastm")
        .about("Run transactional memory demo scenarios")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("warn")
                .help("Log filter used when RUST_LOG is not set"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("TOML file with context settings"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Only print scenario summaries"),
        )
        .subcommand(
            Command::new("eventual")
                .about("Two workers increment a counter only when its parity matches theirs")
                .arg(iterations_arg())
                .arg(interval_arg("300")),
        )
        .subcommand(
            Command::new("guaranteed")
                .about("Two workers retry until the counter parity matches, then increment")
                .arg(iterations_arg())
                .arg(interval_arg("400")),
        )
        .subcommand(
            Command::new("fibonacci")
                .about("Advance a Fibonacci pair atomically while a reader checks every pair")
                .arg(rounds_arg()),
        )
        .subcommand(Command::new("all").about("Run every scenario with default settings"))
}
