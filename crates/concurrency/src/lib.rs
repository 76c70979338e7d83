//! Concurrency layer for stratastm
//!
//! This crate holds the shared state of the engine and the protocols that
//! touch it:
//! - [`Context`]: TVar registry, commit lock, configuration, metrics
//! - [`TVar`] / [`TVarCell`]: typed handles and the versioned cells behind them
//! - [`TransactionLog`]: per-attempt read-set and write-set
//! - [`validate_read_set`]: commit-time conflict detection
//! - [`Waiter`]: block-and-wake support for `retry`
//!
//! The description algebra and the `atomically` loop live one layer up, in
//! `stratastm-engine`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod log;
pub mod metrics;
pub mod tvar;
pub mod validation;
pub mod wait;

pub use context::{BlockOutcome, CommitOutcome, Context, ContextBuilder};
pub use log::{LogSummary, TransactionLog};
pub use metrics::ContextMetrics;
pub use tvar::{take_value, RawTVar, SharedValue, TVar, TVarCell, TValue};
pub use validation::{validate_read_set, ConflictType, ValidationResult};
pub use wait::Waiter;
