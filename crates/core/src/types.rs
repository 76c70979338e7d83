//! Identifier and version types
//!
//! - [`ContextId`]: process-unique identifier of a context
//! - [`TVarId`]: identifier of a transactional variable, unique within its context
//! - [`Version`]: committed version of a transactional variable

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of process-unique context identifiers.
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a context
///
/// Two contexts created in the same process never share an id, so a
/// `ContextId` is enough to tell whether a TVar handle belongs to a context.
///
/// # Examples
///
/// ```
/// use stratastm_core::types::ContextId;
///
/// let a = ContextId::next();
/// let b = ContextId::next();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Identifier of a transactional variable
///
/// Allocated by the owning context from its own counter; only meaningful
/// together with the [`ContextId`] of that context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TVarId(u64);

impl TVarId {
    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        TVarId(raw)
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TVarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tvar-{}", self.0)
    }
}

/// Monotonic id generator used by a context for its TVars
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose first id is 1
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id
    pub fn next_tvar_id(&self) -> TVarId {
        TVarId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Committed version of a transactional variable
///
/// Starts at [`Version::INITIAL`] when the variable is created and advances
/// by one on every commit that writes the variable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// Version of a freshly created variable
    pub const INITIAL: Version = Version(0);

    /// Wrap a raw version
    pub const fn new(raw: u64) -> Self {
        Version(raw)
    }

    /// The version following this one
    #[inline]
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
