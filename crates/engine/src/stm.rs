//! Transaction descriptions
//!
//! An [`Stm<T>`] describes a transaction that yields a `T`. Building one has
//! no effect: it is an immutable tree of steps that `atomically` interprets,
//! once per attempt, against a fresh log.
//!
//! ```
//! use stratastm_engine::{atomically, modify_ret, Context};
//!
//! let ctx = Context::new();
//! let counter = ctx.new_tvar(0i32);
//!
//! let increment = modify_ret(&counter, |n| n + 1);
//! assert_eq!(atomically(&ctx, &increment).unwrap(), 1);
//! assert_eq!(atomically(&ctx, &increment).unwrap(), 2);
//! ```
//!
//! ## Purity
//!
//! Closures passed to [`bind`], [`map`], [`modify`] and friends may run once
//! per attempt, so they must not perform I/O, logging or any other effect
//! outside the TVars they read and write.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use stratastm_concurrency::{take_value, RawTVar, SharedValue, TVar, TValue};
use stratastm_core::{Result, StmError};

pub(crate) type Continuation = Arc<dyn Fn(SharedValue) -> Result<Arc<Op>> + Send + Sync>;
pub(crate) type Transform = Arc<dyn Fn(SharedValue) -> Result<SharedValue> + Send + Sync>;
pub(crate) type ErrorFactory = Arc<dyn Fn() -> anyhow::Error + Send + Sync>;

/// One step of a description
pub(crate) enum Op {
    Pure(SharedValue),
    Bind(Arc<Op>, Continuation),
    Map(Arc<Op>, Transform),
    Read(RawTVar),
    Write(RawTVar, SharedValue),
    Retry,
    Both(Arc<Op>, Arc<Op>),
    Fail(ErrorFactory),
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Pure(_) => f.write_str("Pure"),
            Op::Bind(inner, _) => f.debug_tuple("Bind").field(inner).finish(),
            Op::Map(inner, _) => f.debug_tuple("Map").field(inner).finish(),
            Op::Read(tvar) => f.debug_tuple("Read").field(&tvar.id).finish(),
            Op::Write(tvar, _) => f.debug_tuple("Write").field(&tvar.id).finish(),
            Op::Retry => f.write_str("Retry"),
            Op::Both(left, right) => f.debug_tuple("Both").field(left).field(right).finish(),
            Op::Fail(_) => f.write_str("Fail"),
        }
    }
}

pub(crate) fn unit() -> SharedValue {
    Arc::new(())
}

/// Immutable description of a transaction yielding `T`
///
/// Cloning is cheap and shares the underlying steps.
pub struct Stm<T> {
    pub(crate) op: Arc<Op>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Stm<T> {
    fn from_op(op: Op) -> Self {
        Self::from_arc(Arc::new(op))
    }

    fn from_arc(op: Arc<Op>) -> Self {
        Self {
            op,
            _marker: PhantomData,
        }
    }

    /// Run `next` after this description, discarding this result
    pub fn then<B>(self, next: Stm<B>) -> Stm<B> {
        then(self, next)
    }
}

impl<T: TValue> Stm<T> {
    /// Feed the result into `f` to pick the next step
    pub fn and_then<B, F>(self, f: F) -> Stm<B>
    where
        F: Fn(T) -> Stm<B> + Send + Sync + 'static,
    {
        bind(self, f)
    }

    /// Transform the result
    pub fn map<B: TValue, F>(self, f: F) -> Stm<B>
    where
        F: Fn(T) -> B + Send + Sync + 'static,
    {
        map(self, f)
    }

    /// Run both in the same attempt and pair the results
    pub fn zip<B: TValue>(self, other: Stm<B>) -> Stm<(T, B)> {
        both(self, other)
    }
}

impl<T> Clone for Stm<T> {
    fn clone(&self) -> Self {
        Self::from_arc(Arc::clone(&self.op))
    }
}

impl<T> fmt::Debug for Stm<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stm<{}>({:?})", type_name::<T>(), self.op)
    }
}

// ============================================================================
// Primitive steps
// ============================================================================

/// A transaction that yields `value` and touches no TVar
pub fn pure<T: TValue>(value: T) -> Stm<T> {
    Stm::from_op(Op::Pure(Arc::new(value)))
}

/// Run `first`, pass its result to `f`, and continue with the description
/// `f` returns, all in the same attempt
pub fn bind<A, B, F>(first: Stm<A>, f: F) -> Stm<B>
where
    A: TValue,
    F: Fn(A) -> Stm<B> + Send + Sync + 'static,
{
    let k: Continuation = Arc::new(move |value| {
        let a = take_value::<A>(value)?;
        Ok(f(a).op)
    });
    Stm::from_op(Op::Bind(first.op, k))
}

/// Like [`bind`], but `f` may fail; the failure aborts the transaction
pub fn try_bind<A, B, F>(first: Stm<A>, f: F) -> Stm<B>
where
    A: TValue,
    F: Fn(A) -> anyhow::Result<Stm<B>> + Send + Sync + 'static,
{
    let k: Continuation = Arc::new(move |value| {
        let a = take_value::<A>(value)?;
        f(a).map(|next| next.op).map_err(StmError::Aborted)
    });
    Stm::from_op(Op::Bind(first.op, k))
}

/// Transform the result of `inner`
pub fn map<A, B, F>(inner: Stm<A>, f: F) -> Stm<B>
where
    A: TValue,
    B: TValue,
    F: Fn(A) -> B + Send + Sync + 'static,
{
    let t: Transform = Arc::new(move |value| {
        let a = take_value::<A>(value)?;
        Ok(Arc::new(f(a)) as SharedValue)
    });
    Stm::from_op(Op::Map(inner.op, t))
}

/// Like [`map`], but `f` may fail; the failure aborts the transaction
pub fn try_map<A, B, F>(inner: Stm<A>, f: F) -> Stm<B>
where
    A: TValue,
    B: TValue,
    F: Fn(A) -> anyhow::Result<B> + Send + Sync + 'static,
{
    let t: Transform = Arc::new(move |value| {
        let a = take_value::<A>(value)?;
        let b = f(a).map_err(StmError::Aborted)?;
        Ok(Arc::new(b) as SharedValue)
    });
    Stm::from_op(Op::Map(inner.op, t))
}

/// Run `first` then `second`, yielding the result of `second`
pub fn then<A, B>(first: Stm<A>, second: Stm<B>) -> Stm<B> {
    let next = second.op;
    let k: Continuation = Arc::new(move |_| Ok(Arc::clone(&next)));
    Stm::from_op(Op::Bind(first.op, k))
}

/// Read a TVar
///
/// Yields the pending value if this attempt already wrote the TVar,
/// otherwise the committed value, recording its version in the read-set.
pub fn read<T: TValue>(tvar: &TVar<T>) -> Stm<T> {
    Stm::from_op(Op::Read(tvar.raw()))
}

/// Buffer `value` as the new value of a TVar; visible to others on commit
pub fn write<T: TValue>(tvar: &TVar<T>, value: T) -> Stm<()> {
    Stm::from_op(Op::Write(tvar.raw(), Arc::new(value)))
}

/// Abandon the attempt and block until a TVar read so far is committed
pub fn retry<T>() -> Stm<T> {
    Stm::from_op(Op::Retry)
}

/// Run `first` and `second` in the same attempt and commit them together
pub fn both<A: TValue, B: TValue>(first: Stm<A>, second: Stm<B>) -> Stm<(A, B)> {
    let t: Transform = Arc::new(|value| {
        let (a, b) = take_value::<(SharedValue, SharedValue)>(value)?;
        Ok(Arc::new((take_value::<A>(a)?, take_value::<B>(b)?)) as SharedValue)
    });
    Stm::from_op(Op::Map(Arc::new(Op::Both(first.op, second.op)), t))
}

/// Like [`both`], discarding both results
pub fn both_voided<A, B>(first: Stm<A>, second: Stm<B>) -> Stm<()> {
    let t: Transform = Arc::new(|_| Ok(unit()));
    Stm::from_op(Op::Map(Arc::new(Op::Both(first.op, second.op)), t))
}

/// Abort the transaction with `message`; nothing is committed
pub fn fail<T>(message: impl Into<String>) -> Stm<T> {
    let message: String = message.into();
    fail_with(move || anyhow::anyhow!("{}", message))
}

/// Abort the transaction with the error built by `make`
pub fn fail_with<T, F>(make: F) -> Stm<T>
where
    F: Fn() -> anyhow::Error + Send + Sync + 'static,
{
    Stm::from_op(Op::Fail(Arc::new(make)))
}

// ============================================================================
// Derived combinators
// ============================================================================

/// Apply `f` to a TVar's value
pub fn modify<T, F>(tvar: &TVar<T>, f: F) -> Stm<()>
where
    T: TValue,
    F: Fn(T) -> T + Send + Sync + 'static,
{
    let tvar = *tvar;
    bind(read(&tvar), move |value| write(&tvar, f(value)))
}

/// Apply `f` to a TVar's value and yield the new value
pub fn modify_ret<T, F>(tvar: &TVar<T>, f: F) -> Stm<T>
where
    T: TValue,
    F: Fn(T) -> T + Send + Sync + 'static,
{
    let tvar = *tvar;
    bind(read(&tvar), move |value| {
        let updated = f(value);
        then(write(&tvar, updated.clone()), pure(updated))
    })
}

/// Apply a fallible `f` to a TVar's value; an error aborts the transaction
pub fn try_modify<T, F>(tvar: &TVar<T>, f: F) -> Stm<()>
where
    T: TValue,
    F: Fn(T) -> anyhow::Result<T> + Send + Sync + 'static,
{
    let tvar = *tvar;
    try_bind(read(&tvar), move |value| Ok(write(&tvar, f(value)?)))
}

/// Read a TVar and continue with its value
pub fn with_tvar<T, B, F>(tvar: &TVar<T>, f: F) -> Stm<B>
where
    T: TValue,
    F: Fn(T) -> Stm<B> + Send + Sync + 'static,
{
    bind(read(tvar), f)
}

/// Read two TVars and continue with their values
pub fn with_tvars<A, B, C, F>(a: &TVar<A>, b: &TVar<B>, f: F) -> Stm<C>
where
    A: TValue,
    B: TValue,
    F: Fn(A, B) -> Stm<C> + Send + Sync + 'static,
{
    bind(both(read(a), read(b)), move |(x, y)| f(x, y))
}

/// Read three TVars and continue with their values
pub fn with_tvars3<A, B, C, D, F>(a: &TVar<A>, b: &TVar<B>, c: &TVar<C>, f: F) -> Stm<D>
where
    A: TValue,
    B: TValue,
    C: TValue,
    F: Fn(A, B, C) -> Stm<D> + Send + Sync + 'static,
{
    bind(both(both(read(a), read(b)), read(c)), move |((x, y), z)| {
        f(x, y, z)
    })
}

/// Retry unless `condition` holds
pub fn guard(condition: bool) -> Stm<()> {
    if condition {
        pure(())
    } else {
        retry()
    }
}
