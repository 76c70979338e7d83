//! Per-context transaction counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated by the commit and block protocols
#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    commits: AtomicU64,
    read_only_commits: AtomicU64,
    conflicts: AtomicU64,
    blocked_retries: AtomicU64,
    wakeups: AtomicU64,
    aborts: AtomicU64,
    starvation_warnings: AtomicU64,
    starved_retries: AtomicU64,
    waiting: AtomicU64,
}

macro_rules! counter {
    ($name:ident, $field:ident) => {
        #[inline]
        pub(crate) fn $name(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl MetricsRecorder {
    counter!(record_commit, commits);
    counter!(record_read_only_commit, read_only_commits);
    counter!(record_conflict, conflicts);
    counter!(record_blocked_retry, blocked_retries);
    counter!(record_wakeup, wakeups);
    counter!(record_abort, aborts);
    counter!(record_starvation_warning, starvation_warnings);
    counter!(record_starved_retry, starved_retries);

    pub(crate) fn enter_wait(&self) {
        self.waiting.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn leave_wait(&self) {
        self.waiting.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ContextMetrics {
        ContextMetrics {
            commits: self.commits.load(Ordering::Relaxed),
            read_only_commits: self.read_only_commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            blocked_retries: self.blocked_retries.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            starvation_warnings: self.starvation_warnings.load(Ordering::Relaxed),
            starved_retries: self.starved_retries.load(Ordering::Relaxed),
            waiting: self.waiting.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a context's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextMetrics {
    /// Successful commits that wrote at least one TVar
    pub commits: u64,
    /// Successful commits with an empty write-set
    pub read_only_commits: u64,
    /// Attempts discarded because a concurrent commit invalidated them
    pub conflicts: u64,
    /// Attempts that blocked in `retry`
    pub blocked_retries: u64,
    /// Blocked attempts that were woken by a commit
    pub wakeups: u64,
    /// Transactions that ended with a user or usage error
    pub aborts: u64,
    /// Watchdog warnings about long-blocked retries
    pub starvation_warnings: u64,
    /// Retries refused because their read-set was empty
    pub starved_retries: u64,
    /// Attempts blocked right now
    pub waiting: u64,
}

impl ContextMetrics {
    /// Total successful commits, read-only included
    pub fn total_committed(&self) -> u64 {
        self.commits + self.read_only_commits
    }

    /// Fraction of validated attempts that committed (0.0 - 1.0)
    pub fn commit_rate(&self) -> f64 {
        let committed = self.total_committed();
        let total = committed + self.conflicts;
        if total == 0 {
            1.0
        } else {
            committed as f64 / total as f64
        }
    }
}
