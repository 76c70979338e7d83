//! Transactional variables
//!
//! A [`TVarCell`] is the engine-owned storage of one variable: the last
//! committed value, its [`Version`], and the waiters blocked on it. Cells
//! live in the registry of the [`Context`](crate::Context) that created them.
//!
//! Callers only ever hold a [`TVar<T>`], a typed handle made of the owning
//! context id and the variable id. Handles are resolved against a context
//! on every access, which is what makes a foreign handle detectable.

use crate::wait::Waiter;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use stratastm_core::{ContextId, TVarId, Version};

/// Type-erased value shared between a cell and the logs that read it
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// Bound for anything stored in a TVar or produced by a transaction
pub trait TValue: Any + Clone + Send + Sync {}

impl<T: Any + Clone + Send + Sync> TValue for T {}

/// Extract a `T` out of a shared value, cloning only if it is still shared
pub fn take_value<T: TValue>(value: SharedValue) -> stratastm_core::Result<T> {
    match value.downcast::<T>() {
        Ok(arc) => Ok(Arc::try_unwrap(arc).unwrap_or_else(|arc| (*arc).clone())),
        Err(_) => Err(stratastm_core::StmError::type_mismatch::<T>()),
    }
}

/// Committed state of a cell; value and version always change together
struct Slot {
    value: SharedValue,
    version: Version,
}

/// Engine-owned storage of one transactional variable
pub struct TVarCell {
    id: TVarId,
    owner: ContextId,
    type_name: &'static str,
    slot: RwLock<Slot>,
    waiters: Mutex<SmallVec<[Arc<Waiter>; 2]>>,
}

impl TVarCell {
    pub(crate) fn new(
        id: TVarId,
        owner: ContextId,
        value: SharedValue,
        type_name: &'static str,
    ) -> Self {
        Self {
            id,
            owner,
            type_name,
            slot: RwLock::new(Slot {
                value,
                version: Version::INITIAL,
            }),
            waiters: Mutex::new(SmallVec::new()),
        }
    }

    /// Identifier of this variable
    pub fn id(&self) -> TVarId {
        self.id
    }

    /// Context that owns this variable
    pub fn owner(&self) -> ContextId {
        self.owner
    }

    /// Current committed version
    pub fn version(&self) -> Version {
        self.slot.read().version
    }

    /// Committed value and its version, read as one pair
    pub(crate) fn snapshot(&self) -> (SharedValue, Version) {
        let slot = self.slot.read();
        (Arc::clone(&slot.value), slot.version)
    }

    /// Replace the committed value and advance the version.
    ///
    /// Must only be called by the commit step while the commit lock is held.
    pub(crate) fn install(&self, value: SharedValue) -> Version {
        let mut slot = self.slot.write();
        slot.value = value;
        slot.version = slot.version.next();
        slot.version
    }

    pub(crate) fn register(&self, waiter: &Arc<Waiter>) {
        self.waiters.lock().push(Arc::clone(waiter));
    }

    pub(crate) fn deregister(&self, waiter: &Arc<Waiter>) {
        self.waiters.lock().retain(|w| !Arc::ptr_eq(w, waiter));
    }

    /// Remove and return every waiter; called when this cell is written
    pub(crate) fn take_waiters(&self) -> SmallVec<[Arc<Waiter>; 2]> {
        std::mem::take(&mut *self.waiters.lock())
    }

    /// Number of transactions currently blocked on this cell
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl fmt::Debug for TVarCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TVarCell")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("type", &self.type_name)
            .field("version", &self.version())
            .finish()
    }
}

/// Untyped reference to a transactional variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawTVar {
    /// Context that created the variable
    pub context: ContextId,
    /// Variable id within that context
    pub id: TVarId,
}

/// Typed handle to a transactional variable
///
/// Handles are cheap to copy and safe to send across threads. They carry no
/// access to the value: reads and writes are expressed as transaction steps
/// and run through `atomically`.
pub struct TVar<T> {
    raw: RawTVar,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TVar<T> {
    pub(crate) fn from_raw(raw: RawTVar) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Identifier of this variable within its context
    pub fn id(&self) -> TVarId {
        self.raw.id
    }

    /// Context that created this variable
    pub fn context_id(&self) -> ContextId {
        self.raw.context
    }

    /// Untyped form used by the description algebra
    pub fn raw(&self) -> RawTVar {
        self.raw
    }
}

impl<T> Clone for TVar<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TVar<T> {}

impl<T> PartialEq for TVar<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for TVar<T> {}

impl<T> fmt::Debug for TVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TVar<{}>({}@{})",
            std::any::type_name::<T>(),
            self.raw.id,
            self.raw.context
        )
    }
}
