//! Context: TVar registry and commit coordinator
//!
//! A [`Context`] owns every TVar it creates and serializes the two points
//! where attempts synchronize:
//!
//! ```text
//! commit:                          block (retry):
//!   lock commit_lock                 lock commit_lock
//!   validate read-set                validate read-set  (stale → re-run)
//!   apply writes, bump versions      register waiter on every read TVar
//!   drain waiters of written TVars   unlock
//!   unlock                           park until notified
//!   notify drained waiters           deregister waiter
//! ```
//!
//! Registration and validation of a blocking attempt happen under the same
//! lock as commits, so a commit either lands before validation (the attempt
//! re-runs at once) or after registration (the commit wakes it). A wake-up
//! cannot be missed.

use crate::log::TransactionLog;
use crate::metrics::{ContextMetrics, MetricsRecorder};
use crate::tvar::{RawTVar, TVar, TVarCell, TValue};
use crate::validation::{validate_read_set, ValidationResult};
use crate::wait::Waiter;
use dashmap::DashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stratastm_core::types::IdGenerator;
use stratastm_core::{ContextId, Result, StmConfig, StmError, TVarId};
use tracing::{debug, trace, warn};

/// Result of trying to commit a log
#[derive(Debug)]
pub enum CommitOutcome {
    /// Writes applied; `writes` TVars changed
    Committed {
        /// Number of TVars written
        writes: usize,
    },
    /// A concurrent commit invalidated the read-set; nothing was applied
    Conflict(ValidationResult),
}

impl CommitOutcome {
    /// True if the log was applied
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }
}

/// Result of blocking on a log's read-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// A TVar in the read-set was committed while blocked
    Woken,
    /// The read-set was already stale; the attempt should re-run at once
    Stale,
}

struct ContextInner {
    id: ContextId,
    ids: IdGenerator,
    tvars: DashMap<TVarId, Arc<TVarCell>>,
    /// Commit serialization lock
    ///
    /// Held from validation until every write is applied and every waiter
    /// of the written TVars is drained. Blocking attempts hold it while they
    /// validate and register.
    commit_lock: Mutex<()>,
    /// Even while no commit is installing writes, odd while one is
    commit_clock: AtomicU64,
    config: StmConfig,
    metrics: MetricsRecorder,
}

/// Owner of a family of TVars and coordinator of their commits
///
/// Cloning a `Context` yields another handle to the same registry. The TVars
/// are dropped together with the last handle.
///
/// # Example
///
/// ```
/// use stratastm_concurrency::Context;
/// use std::sync::Arc;
///
/// let ctx = Context::new();
/// let counter = ctx.new_tvar(0u64);
///
/// let mut log = ctx.begin();
/// log.write(counter.raw(), Arc::new(1u64)).unwrap();
/// assert!(log.commit().is_committed());
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a context with default configuration
    pub fn new() -> Self {
        Self::with_config(StmConfig::default())
    }

    /// Create a context with the given configuration
    pub fn with_config(config: StmConfig) -> Self {
        let id = ContextId::next();
        debug!(context = %id, ?config, "Context created");
        Self {
            inner: Arc::new(ContextInner {
                id,
                ids: IdGenerator::new(),
                tvars: DashMap::new(),
                commit_lock: Mutex::new(()),
                commit_clock: AtomicU64::new(0),
                config,
                metrics: MetricsRecorder::default(),
            }),
        }
    }

    /// Create a builder for context configuration
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Identifier of this context
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Configuration this context was built with
    pub fn config(&self) -> &StmConfig {
        &self.inner.config
    }

    /// Number of TVars owned by this context
    pub fn tvar_count(&self) -> usize {
        self.inner.tvars.len()
    }

    /// Snapshot of the transaction counters
    pub fn metrics(&self) -> ContextMetrics {
        self.inner.metrics.snapshot()
    }

    /// True if both handles refer to the same context
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a new TVar holding `initial` at the baseline version
    pub fn new_tvar<T: TValue>(&self, initial: T) -> TVar<T> {
        let id = self.inner.ids.next_tvar_id();
        let cell = TVarCell::new(
            id,
            self.inner.id,
            Arc::new(initial),
            std::any::type_name::<T>(),
        );
        self.inner.tvars.insert(id, Arc::new(cell));
        trace!(context = %self.inner.id, tvar = %id, "TVar created");
        TVar::from_raw(RawTVar {
            context: self.inner.id,
            id,
        })
    }

    /// Start a fresh, empty log for one attempt
    pub fn begin(&self) -> TransactionLog {
        TransactionLog::new(self.clone())
    }

    /// Fail with `ForeignTVar` unless `tvar` was created by this context
    pub fn check_owner(&self, tvar: RawTVar) -> Result<()> {
        if tvar.context != self.inner.id {
            return Err(StmError::ForeignTVar {
                tvar: tvar.id,
                owner: tvar.context,
                context: self.inner.id,
            });
        }
        Ok(())
    }

    /// Look up the cell behind a handle
    pub fn resolve(&self, tvar: RawTVar) -> Result<Arc<TVarCell>> {
        self.check_owner(tvar)?;
        self.inner
            .tvars
            .get(&tvar.id)
            .map(|cell| Arc::clone(cell.value()))
            .ok_or(StmError::UnknownTVar {
                tvar: tvar.id,
                context: self.inner.id,
            })
    }

    /// Record a transaction that ended with an error after validation
    pub fn record_abort(&self) {
        self.inner.metrics.record_abort();
    }

    /// Record an attempt discarded because its read-set went stale
    pub fn record_conflict(&self) {
        self.inner.metrics.record_conflict();
    }

    /// Validate a log under the commit lock without applying anything
    pub fn validate(&self, log: &TransactionLog) -> ValidationResult {
        let _commit_guard = self.inner.commit_lock.lock();
        validate_read_set(log)
    }

    /// Current value of the commit clock
    ///
    /// Advances by two around every commit that installs writes. A reader
    /// that sees the same even value before and after a snapshot saw no
    /// install in between.
    pub(crate) fn commit_clock(&self) -> u64 {
        self.inner.commit_clock.load(Ordering::SeqCst)
    }

    pub(crate) fn commit_log(&self, log: TransactionLog) -> CommitOutcome {
        let mut woken: SmallVec<[Arc<Waiter>; 4]> = SmallVec::new();
        let writes;
        {
            let _commit_guard = self.inner.commit_lock.lock();

            let validation = validate_read_set(&log);
            if !validation.is_valid() {
                self.inner.metrics.record_conflict();
                debug!(
                    context = %self.inner.id,
                    conflicts = validation.conflict_count(),
                    "Commit rejected by validation"
                );
                return CommitOutcome::Conflict(validation);
            }

            let entries = log.into_writes();
            writes = entries.len();
            if writes > 0 {
                self.inner.commit_clock.fetch_add(1, Ordering::SeqCst);
                for (id, entry) in entries {
                    let version = entry.cell.install(entry.value);
                    woken.extend(entry.cell.take_waiters());
                    trace!(context = %self.inner.id, tvar = %id, %version, "TVar committed");
                }
                self.inner.commit_clock.fetch_add(1, Ordering::SeqCst);
            }
        }

        if writes == 0 {
            self.inner.metrics.record_read_only_commit();
        } else {
            self.inner.metrics.record_commit();
        }

        // A waiter registered on several written TVars appears once per TVar
        for waiter in &woken {
            waiter.notify();
        }
        if !woken.is_empty() {
            debug!(context = %self.inner.id, waiters = woken.len(), "Woke blocked transactions");
        }

        CommitOutcome::Committed { writes }
    }

    pub(crate) fn block_log(&self, log: TransactionLog) -> Result<BlockOutcome> {
        let waiter = Arc::new(Waiter::new());
        {
            let _commit_guard = self.inner.commit_lock.lock();

            let validation = validate_read_set(&log);
            if !validation.is_valid() {
                self.inner.metrics.record_conflict();
                debug!(context = %self.inner.id, "Retry read-set already stale, re-running");
                return Ok(BlockOutcome::Stale);
            }

            if log.read_count() == 0 {
                self.inner.metrics.record_starved_retry();
                warn!(
                    context = %self.inner.id,
                    "retry reached with an empty read-set; no commit can ever wake it"
                );
                return Err(StmError::StarvedRetry {
                    context: self.inner.id,
                });
            }

            for (_, entry) in log.read_entries() {
                entry.cell.register(&waiter);
            }
        }

        self.inner.metrics.record_blocked_retry();
        self.inner.metrics.enter_wait();
        debug!(context = %self.inner.id, wake_set = log.read_count(), "Transaction blocked in retry");

        let context = self.inner.id;
        let metrics = &self.inner.metrics;
        let wake_set = log.read_set();
        let waited = waiter.wait(self.inner.config.starvation_threshold(), |waited: Duration| {
            metrics.record_starvation_warning();
            warn!(
                %context,
                waited_ms = waited.as_millis() as u64,
                wake_set = ?wake_set,
                "Blocked retry has not been woken; possible starvation"
            );
        });

        for (_, entry) in log.read_entries() {
            entry.cell.deregister(&waiter);
        }
        self.inner.metrics.leave_wait();
        self.inner.metrics.record_wakeup();
        debug!(context = %self.inner.id, waited_us = waited.as_micros() as u64, "Transaction woken");

        Ok(BlockOutcome::Woken)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("tvars", &self.inner.tvars.len())
            .finish()
    }
}

/// Builder for context configuration
///
/// # Example
///
/// ```
/// use stratastm_concurrency::Context;
/// use std::time::Duration;
///
/// let ctx = Context::builder()
///     .starvation_threshold(Duration::from_secs(1))
///     .conflict_warning_threshold(100)
///     .build();
/// assert_eq!(ctx.config().conflict_warning_threshold, 100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: StmConfig,
}

impl ContextBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: StmConfig) -> Self {
        self.config = config;
        self
    }

    /// Warn when a blocked retry waits longer than `threshold`
    pub fn starvation_threshold(mut self, threshold: Duration) -> Self {
        let millis = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self.config.starvation_threshold_ms = Some(millis.max(1));
        self
    }

    /// Disable the blocked-retry watchdog
    pub fn no_watchdog(mut self) -> Self {
        self.config.starvation_threshold_ms = None;
        self
    }

    /// Warn after this many consecutive conflicts of one transaction
    pub fn conflict_warning_threshold(mut self, attempts: u32) -> Self {
        self.config.conflict_warning_threshold = attempts.max(1);
        self
    }

    /// Build the context
    pub fn build(self) -> Context {
        Context::with_config(self.config)
    }
}
