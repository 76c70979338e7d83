//! # stratastm
//!
//! Composable software transactional memory.
//!
//! Threads share [`TVar`]s owned by a [`Context`] and change them through
//! transactions described as [`Stm`] values. [`atomically`] evaluates a
//! description optimistically against a private log, then either commits
//! every write at once or discards the attempt and runs it again. A
//! description that reaches [`retry`] blocks until one of the TVars it read
//! is changed by another commit.
//!
//! ## Quick Start
//!
//! ```
//! use stratastm::prelude::*;
//!
//! let ctx = Context::new();
//! let from = ctx.new_tvar(100i64);
//! let to = ctx.new_tvar(0i64);
//!
//! // Move 30 from one account to the other; both writes land together
//! let transfer = with_tvars(&from, &to, move |a, b| {
//!     both_voided(write(&from, a - 30), write(&to, b + 30))
//! });
//! atomically(&ctx, &transfer)?;
//!
//! assert_eq!(atomically(&ctx, &both(read(&from), read(&to)))?, (70, 30));
//! # Ok::<(), stratastm::StmError>(())
//! ```
//!
//! ## Blocking retry
//!
//! ```
//! use stratastm::prelude::*;
//! use std::thread;
//!
//! let ctx = Context::new();
//! let ready = ctx.new_tvar(false);
//!
//! let waiter = {
//!     let ctx = ctx.clone();
//!     thread::spawn(move || {
//!         // Blocks until another thread sets `ready`
//!         atomically(&ctx, &with_tvar(&ready, |r| guard(r))).unwrap();
//!     })
//! };
//!
//! atomically(&ctx, &write(&ready, true)).unwrap();
//! waiter.join().unwrap();
//! ```
//!
//! ## Crates
//!
//! - `stratastm-core`: ids, versions, [`StmError`], [`StmConfig`]
//! - `stratastm-concurrency`: TVar cells, [`Context`], logs, validation, wait/wake
//! - `stratastm-engine`: the [`Stm`] algebra and the [`atomically`] interpreter

#![warn(missing_docs)]

pub mod prelude;

pub use stratastm_concurrency::{
    BlockOutcome, CommitOutcome, ConflictType, Context, ContextBuilder, ContextMetrics,
    LogSummary, TVar, TValue, TransactionLog, ValidationResult,
};
pub use stratastm_core::{ConfigError, ContextId, Result, StmConfig, StmError, TVarId, Version};
pub use stratastm_engine::{
    atomically, bind, both, both_voided, fail, fail_with, guard, inspect, map, modify, modify_ret,
    new_tvar, pure, read, retry, then, try_bind, try_map, try_modify, with_tvar, with_tvars,
    with_tvars3, write, Atomically, InspectOutcome, Inspection, Stm,
};
