//! Comprehensive STM Test Suite
//!
//! ## Modules
//!
//! - `atomicity`: multi-TVar commits are never observed half-applied
//! - `serializability`: concurrent read-modify-write loses no update
//! - `retry`: blocking retry wakes on the right commits and only then
//! - `purity`: re-evaluating a description is deterministic
//! - `errors`: usage errors, user failures and starvation
//! - `metrics`: context counters and configuration

pub use stratastm::prelude::*;
pub use stratastm::{inspect, ContextMetrics, InspectOutcome, StmConfig};

mod atomicity;
mod errors;
mod retry;
mod serializability;

/// Context with the watchdog disabled, for tests that block on purpose
pub fn quiet_context() -> Context {
    Context::builder().no_watchdog().build()
}

/// Committed value of a TVar
pub fn committed<T: stratastm::TValue>(ctx: &Context, tvar: &TVar<T>) -> T {
    atomically(ctx, &read(tvar)).unwrap()
}
