//! Transaction engine for stratastm
//!
//! This crate turns the concurrency layer into a composable API:
//! - [`Stm`]: immutable description of a transaction, built from
//!   [`pure`], [`bind`], [`read`], [`write`], [`retry`], [`both`] and the
//!   combinators derived from them
//! - [`atomically`]: evaluate a description, validate, commit, or block in
//!   `retry` until a TVar it read changes
//! - [`inspect`]: evaluate once without committing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod interpreter;
pub mod stm;

pub use interpreter::{atomically, inspect, Atomically, InspectOutcome, Inspection};
pub use stm::{
    bind, both, both_voided, fail, fail_with, guard, map, modify, modify_ret, pure, read, retry,
    then, try_bind, try_map, try_modify, with_tvar, with_tvars, with_tvars3, write, Stm,
};

// Re-export the shared state types for convenience
pub use stratastm_concurrency::{Context, ContextBuilder, ContextMetrics, LogSummary, TVar};
pub use stratastm_core::{Result, StmConfig, StmError};

/// Create a TVar owned by `context`
pub fn new_tvar<T: stratastm_concurrency::TValue>(context: &Context, initial: T) -> TVar<T> {
    context.new_tvar(initial)
}
