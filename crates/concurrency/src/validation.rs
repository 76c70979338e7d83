//! Read-set validation
//!
//! An attempt may commit only if every TVar it read still carries the
//! version it observed. Validation runs under the commit lock, so a passing
//! result stays true until the lock is released.

use crate::log::TransactionLog;
use stratastm_core::{StmError, TVarId, Version};

/// Why an attempt cannot commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// A TVar in the read-set was committed by someone else since it was read
    StaleRead {
        /// Variable whose version moved
        tvar: TVarId,
        /// Version the attempt observed
        expected: Version,
        /// Version committed now
        actual: Version,
    },
}

impl ConflictType {
    /// Variable involved in the conflict
    pub fn tvar(&self) -> TVarId {
        match self {
            ConflictType::StaleRead { tvar, .. } => *tvar,
        }
    }
}

impl From<ConflictType> for StmError {
    fn from(conflict: ConflictType) -> Self {
        match conflict {
            ConflictType::StaleRead {
                tvar,
                expected,
                actual,
            } => StmError::Conflict {
                tvar,
                expected,
                actual,
            },
        }
    }
}

/// Outcome of validating a read-set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// A result with no conflicts
    pub fn ok() -> Self {
        Self::default()
    }

    /// True if the attempt may commit
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Every conflict found, sorted by TVar id
    pub fn conflicts(&self) -> &[ConflictType] {
        &self.conflicts
    }

    /// Number of conflicts found
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// First conflict as an error, if any
    pub fn into_error(self) -> Option<StmError> {
        self.conflicts.into_iter().next().map(StmError::from)
    }

    fn push(&mut self, conflict: ConflictType) {
        self.conflicts.push(conflict);
    }
}

/// Compare every read-set version with the TVar's committed version
pub fn validate_read_set(log: &TransactionLog) -> ValidationResult {
    let mut result = ValidationResult::ok();
    for (id, entry) in log.read_entries() {
        let actual = entry.cell.version();
        if actual != entry.version {
            result.push(ConflictType::StaleRead {
                tvar: *id,
                expected: entry.version,
                actual,
            });
        }
    }
    result.conflicts.sort_unstable_by_key(ConflictType::tvar);
    result
}
