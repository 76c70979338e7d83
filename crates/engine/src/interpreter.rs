//! The `atomically` interpreter
//!
//! Each attempt evaluates the description into a fresh [`TransactionLog`]
//! with an explicit stack of pending frames, so arbitrarily long `bind`
//! chains never grow the native stack and restarting an attempt is just
//! evaluating the root again.
//!
//! ```text
//! loop {
//!     log = context.begin()
//!     match evaluate(description, log) {
//!         Done(v)  → commit: Committed → return v
//!                            Conflict  → next attempt
//!         Retry    → block on read-set → next attempt
//!         Err(e)   → validate: stale → next attempt
//!                              valid → return Err(e)
//!     }
//! }
//! ```
//!
//! Reads within an attempt always agree with each other; a read that would
//! pair a fresh value with a stale one fails with `Conflict` instead. An
//! error is only surfaced when the snapshot it was computed from is still
//! current. Otherwise the attempt is re-run.

use crate::stm::{unit, Continuation, Op, Stm, Transform};
use std::sync::Arc;
use stratastm_concurrency::{
    take_value, BlockOutcome, CommitOutcome, Context, LogSummary, SharedValue, TValue,
    TransactionLog,
};
use stratastm_core::{Result, StmError};
use tracing::{debug, trace, warn};

/// How an evaluation finished
pub(crate) enum Evaluation {
    /// The description produced a value
    Done(SharedValue),
    /// The description reached `retry`
    Retry,
}

enum Frame {
    Bind(Continuation),
    Map(Transform),
    BothLeft(Arc<Op>),
    BothRight(SharedValue),
}

enum Step {
    Value(SharedValue),
    Descend(Frame, Arc<Op>),
}

/// Evaluate `root` once against `log`
pub(crate) fn evaluate(root: &Arc<Op>, log: &mut TransactionLog) -> Result<Evaluation> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut current = Arc::clone(root);

    loop {
        let step = match &*current {
            Op::Pure(value) => Step::Value(Arc::clone(value)),
            Op::Read(tvar) => Step::Value(log.read(*tvar)?),
            Op::Write(tvar, value) => {
                log.write(*tvar, Arc::clone(value))?;
                Step::Value(unit())
            }
            Op::Retry => return Ok(Evaluation::Retry),
            Op::Fail(make) => return Err(StmError::Aborted(make())),
            Op::Bind(inner, k) => Step::Descend(Frame::Bind(Arc::clone(k)), Arc::clone(inner)),
            Op::Map(inner, f) => Step::Descend(Frame::Map(Arc::clone(f)), Arc::clone(inner)),
            Op::Both(left, right) => {
                Step::Descend(Frame::BothLeft(Arc::clone(right)), Arc::clone(left))
            }
        };

        let mut value = match step {
            Step::Value(value) => value,
            Step::Descend(frame, next) => {
                stack.push(frame);
                current = next;
                continue;
            }
        };

        // Unwind completed frames until one needs another description evaluated
        loop {
            match stack.pop() {
                None => return Ok(Evaluation::Done(value)),
                Some(Frame::Bind(k)) => {
                    current = k(value)?;
                    break;
                }
                Some(Frame::Map(f)) => value = f(value)?,
                Some(Frame::BothLeft(right)) => {
                    stack.push(Frame::BothRight(value));
                    current = right;
                    break;
                }
                Some(Frame::BothRight(left)) => {
                    let pair: (SharedValue, SharedValue) = (left, value);
                    value = Arc::new(pair);
                }
            }
        }
    }
}

/// Run `stm` as one indivisible transaction against `context`
///
/// Blocks until the transaction commits. Returns an error if the
/// description touches a TVar of another context, if user code fails, or
/// if it reaches `retry` without having read any TVar.
pub fn atomically<T: TValue>(context: &Context, stm: &Stm<T>) -> Result<T> {
    let threshold = context.config().conflict_warning_threshold;
    let mut attempt: u64 = 0;
    let mut conflicts_in_row: u32 = 0;

    loop {
        attempt += 1;
        let mut log = context.begin();
        trace!(context = %context.id(), attempt, "Transaction attempt");

        let stale = match evaluate(&stm.op, &mut log) {
            Ok(Evaluation::Done(value)) => match log.commit() {
                CommitOutcome::Committed { writes } => {
                    trace!(context = %context.id(), attempt, writes, "Transaction committed");
                    return take_value::<T>(value);
                }
                CommitOutcome::Conflict(validation) => {
                    debug!(
                        context = %context.id(),
                        attempt,
                        conflicts = validation.conflict_count(),
                        "Transaction conflicted, re-running"
                    );
                    true
                }
            },
            Ok(Evaluation::Retry) => match log.block()? {
                BlockOutcome::Woken => {
                    conflicts_in_row = 0;
                    false
                }
                BlockOutcome::Stale => true,
            },
            Err(err) => {
                if context.validate(&log).is_valid() {
                    context.record_abort();
                    debug!(context = %context.id(), attempt, error = %err, "Transaction aborted");
                    return Err(err);
                }
                context.record_conflict();
                debug!(
                    context = %context.id(),
                    attempt,
                    error = %err,
                    "Error raised on a stale snapshot, re-running"
                );
                true
            }
        };

        if stale {
            conflicts_in_row = conflicts_in_row.saturating_add(1);
            if conflicts_in_row == threshold {
                warn!(
                    context = %context.id(),
                    attempt,
                    conflicts = conflicts_in_row,
                    "Transaction keeps conflicting; possible livelock"
                );
            }
        }
    }
}

/// How an inspected evaluation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectOutcome {
    /// The description produced a value
    Completed,
    /// The description reached `retry`
    Retried,
}

/// Result of evaluating a description once without committing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    /// Read-set and write-set of the evaluation
    pub summary: LogSummary,
    /// Whether the evaluation completed or retried
    pub outcome: InspectOutcome,
}

/// Evaluate `stm` once against `context` and report its read and write sets
///
/// Nothing is committed and nobody is woken; the log is discarded. A
/// commit racing with the evaluation can make it fail with `Conflict`.
pub fn inspect<T>(context: &Context, stm: &Stm<T>) -> Result<Inspection> {
    let mut log = context.begin();
    let outcome = match evaluate(&stm.op, &mut log)? {
        Evaluation::Done(_) => InspectOutcome::Completed,
        Evaluation::Retry => InspectOutcome::Retried,
    };
    Ok(Inspection {
        summary: log.summary(),
        outcome,
    })
}

/// `atomically` as a method on [`Context`]
pub trait Atomically {
    /// Run `stm` as one indivisible transaction
    fn atomically<T: TValue>(&self, stm: &Stm<T>) -> Result<T>;
}

impl Atomically for Context {
    fn atomically<T: TValue>(&self, stm: &Stm<T>) -> Result<T> {
        atomically(self, stm)
    }
}
