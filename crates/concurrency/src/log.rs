//! Per-attempt transaction log
//!
//! A [`TransactionLog`] records what one attempt has read and what it wants
//! to write:
//!
//! - read-set: TVar id → version (and value) observed at the first read
//! - write-set: TVar id → pending value, invisible until commit
//!
//! Reads of a TVar already in the write-set return the pending value and are
//! not added to the read-set. Repeated reads of the same TVar return the
//! value seen the first time, so one attempt never observes two different
//! committed versions of a variable.
//!
//! Every first read is taken between two equal, even readings of the
//! context's commit clock and re-checks the versions already in the
//! read-set. An attempt therefore only ever sees values that were all
//! committed together at one instant; if an earlier read went stale the
//! read fails with `Conflict` and the attempt is re-run.
//!
//! A log is created by [`Context::begin`](crate::Context::begin) and consumed
//! by [`commit`](TransactionLog::commit) or [`block`](TransactionLog::block);
//! nothing from it survives into the next attempt.

use crate::context::{BlockOutcome, CommitOutcome, Context};
use crate::tvar::{RawTVar, SharedValue, TVarCell};
use crate::validation::validate_read_set;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::thread;
use stratastm_core::{Result, TVarId, Version};

/// A TVar read by the attempt
#[derive(Debug)]
pub(crate) struct ReadEntry {
    pub(crate) cell: Arc<TVarCell>,
    pub(crate) version: Version,
    pub(crate) value: SharedValue,
}

/// A TVar the attempt will write on commit
#[derive(Debug)]
pub(crate) struct WriteEntry {
    pub(crate) cell: Arc<TVarCell>,
    pub(crate) value: SharedValue,
}

/// Read-set and write-set of one attempt, by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSummary {
    /// TVars read, with the version observed, sorted by id
    pub reads: Vec<(TVarId, Version)>,
    /// TVars written, sorted by id
    pub writes: Vec<TVarId>,
}

/// Private log of one attempt
#[derive(Debug)]
pub struct TransactionLog {
    context: Context,
    reads: FxHashMap<TVarId, ReadEntry>,
    writes: FxHashMap<TVarId, WriteEntry>,
}

impl TransactionLog {
    pub(crate) fn new(context: Context) -> Self {
        Self {
            context,
            reads: FxHashMap::default(),
            writes: FxHashMap::default(),
        }
    }

    /// Context this log resolves TVars against
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Read a TVar within this attempt
    ///
    /// Fails with `ForeignTVar` if the TVar was created by another context.
    pub fn read(&mut self, tvar: RawTVar) -> Result<SharedValue> {
        self.context.check_owner(tvar)?;

        if let Some(pending) = self.writes.get(&tvar.id) {
            return Ok(Arc::clone(&pending.value));
        }
        if let Some(seen) = self.reads.get(&tvar.id) {
            return Ok(Arc::clone(&seen.value));
        }

        let cell = self.context.resolve(tvar)?;
        let (value, version) = self.consistent_snapshot(&cell)?;
        self.reads.insert(
            tvar.id,
            ReadEntry {
                cell,
                version,
                value: Arc::clone(&value),
            },
        );
        Ok(value)
    }

    /// Snapshot `cell` so that it agrees with everything read so far
    fn consistent_snapshot(&self, cell: &TVarCell) -> Result<(SharedValue, Version)> {
        loop {
            let before = self.context.commit_clock();
            if before % 2 == 1 {
                // A commit is installing writes
                thread::yield_now();
                continue;
            }
            let snapshot = cell.snapshot();
            if let Some(conflict) = validate_read_set(self).into_error() {
                return Err(conflict);
            }
            if self.context.commit_clock() == before {
                return Ok(snapshot);
            }
        }
    }

    /// Buffer a write; the last write to a TVar within an attempt wins
    pub fn write(&mut self, tvar: RawTVar, value: SharedValue) -> Result<()> {
        self.context.check_owner(tvar)?;

        if let Some(pending) = self.writes.get_mut(&tvar.id) {
            pending.value = value;
            return Ok(());
        }

        let cell = match self.reads.get(&tvar.id) {
            Some(seen) => Arc::clone(&seen.cell),
            None => self.context.resolve(tvar)?,
        };
        self.writes.insert(tvar.id, WriteEntry { cell, value });
        Ok(())
    }

    /// Number of distinct TVars read
    pub fn read_count(&self) -> usize {
        self.reads.len()
    }

    /// Number of distinct TVars written
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// True if the attempt wrote nothing
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Read-set as `(id, version)` pairs sorted by id
    pub fn read_set(&self) -> Vec<(TVarId, Version)> {
        let mut reads: Vec<_> = self
            .reads
            .iter()
            .map(|(id, entry)| (*id, entry.version))
            .collect();
        reads.sort_unstable();
        reads
    }

    /// Ids of the write-set sorted
    pub fn write_set(&self) -> Vec<TVarId> {
        let mut writes: Vec<_> = self.writes.keys().copied().collect();
        writes.sort_unstable();
        writes
    }

    /// Both sets by id
    pub fn summary(&self) -> LogSummary {
        LogSummary {
            reads: self.read_set(),
            writes: self.write_set(),
        }
    }

    /// Validate and apply the write-set atomically
    pub fn commit(self) -> CommitOutcome {
        let context = self.context.clone();
        context.commit_log(self)
    }

    /// Block until a TVar in the read-set is written by another commit
    pub fn block(self) -> Result<BlockOutcome> {
        let context = self.context.clone();
        context.block_log(self)
    }

    pub(crate) fn read_entries(&self) -> impl Iterator<Item = (&TVarId, &ReadEntry)> {
        self.reads.iter()
    }

    pub(crate) fn into_writes(self) -> FxHashMap<TVarId, WriteEntry> {
        self.writes
    }
}
