//! Convenient imports for stratastm.
//!
//! ```
//! use stratastm::prelude::*;
//!
//! let ctx = Context::new();
//! let counter = ctx.new_tvar(0u32);
//! atomically(&ctx, &modify(&counter, |n| n + 1)).unwrap();
//! ```

// Entry points
pub use crate::{atomically, new_tvar, Atomically, Context, ContextBuilder, Stm, TVar};

// Error handling
pub use crate::{Result, StmError};

// Description algebra
pub use crate::{
    bind, both, both_voided, fail, guard, map, modify, modify_ret, pure, read, retry, then,
    try_bind, try_map, try_modify, with_tvar, with_tvars, with_tvars3, write,
};
