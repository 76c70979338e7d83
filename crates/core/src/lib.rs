//! Core types for stratastm
//!
//! This crate defines the vocabulary shared by every layer of the engine:
//! - [`types`]: identifiers for contexts and transactional variables, versions
//! - [`error`]: the [`StmError`] enum and [`Result`] alias
//! - [`config`]: [`StmConfig`], the tunables of a context

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigError, StmConfig};
pub use error::{Result, StmError};
pub use types::{ContextId, TVarId, Version};
