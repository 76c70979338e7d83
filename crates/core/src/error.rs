//! Error types for transactional memory operations
//!
//! [`StmError`] covers every way an `atomically` call can end without a
//! result. Conflicts between concurrent attempts are represented too, but
//! the interpreter resolves them internally by re-running the attempt, so
//! callers only ever observe the other variants.

use crate::types::{ContextId, TVarId, Version};
use thiserror::Error;

/// Result type for transactional memory operations
pub type Result<T> = std::result::Result<T, StmError>;

/// All transactional memory errors
#[derive(Debug, Error)]
pub enum StmError {
    /// A description touched a TVar created by a different context
    #[error("{tvar} belongs to {owner}, not to {context}")]
    ForeignTVar {
        /// The offending variable
        tvar: TVarId,
        /// Context that created the variable
        owner: ContextId,
        /// Context the transaction ran against
        context: ContextId,
    },

    /// A handle names this context but its id is not registered here
    #[error("{tvar} is not registered in {context}")]
    UnknownTVar {
        /// The offending variable
        tvar: TVarId,
        /// Context the transaction ran against
        context: ContextId,
    },

    /// `retry` was reached before any TVar was read, so nothing can wake it
    #[error("retry with an empty read-set in {context} can never be woken")]
    StarvedRetry {
        /// Context the transaction ran against
        context: ContextId,
    },

    /// User code inside the transaction failed; nothing was committed
    #[error("transaction aborted: {0}")]
    Aborted(anyhow::Error),

    /// A concurrent commit changed a TVar this attempt had read
    #[error("conflict on {tvar}: read {expected}, now {actual}")]
    Conflict {
        /// Variable whose version moved
        tvar: TVarId,
        /// Version observed by the attempt
        expected: Version,
        /// Version committed since
        actual: Version,
    },

    /// A dynamically typed value did not have the expected type
    #[error("type mismatch: expected {expected}")]
    TypeMismatch {
        /// Name of the expected type
        expected: &'static str,
    },
}

impl StmError {
    /// Wrap a user error as an abort
    pub fn aborted(err: impl Into<anyhow::Error>) -> Self {
        StmError::Aborted(err.into())
    }

    /// Type mismatch for `T`
    pub fn type_mismatch<T>() -> Self {
        StmError::TypeMismatch {
            expected: std::any::type_name::<T>(),
        }
    }

    /// Check if this error is resolved by re-running the attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, StmError::Conflict { .. })
    }

    /// Check if this error is a misuse of TVar handles
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            StmError::ForeignTVar { .. } | StmError::UnknownTVar { .. }
        )
    }

    /// Check if this error reports a retry that can never be woken
    pub fn is_starvation(&self) -> bool {
        matches!(self, StmError::StarvedRetry { .. })
    }

    /// Check if this error came from user code
    pub fn is_aborted(&self) -> bool {
        matches!(self, StmError::Aborted(_))
    }
}
