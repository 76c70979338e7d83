//! Context configuration
//!
//! [`StmConfig`] holds the diagnostics tunables of a context. It can be built
//! in code or loaded from TOML:
//!
//! ```toml
//! starvation_threshold_ms = 2000
//! conflict_warning_threshold = 500
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default time a blocked retry may wait before the watchdog warns
pub const DEFAULT_STARVATION_THRESHOLD_MS: u64 = 5_000;

/// Default number of consecutive conflicts before a livelock warning
pub const DEFAULT_CONFLICT_WARNING_THRESHOLD: u32 = 1_000;

/// Errors loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Tunables of a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StmConfig {
    /// How long a blocked retry waits before the watchdog logs a starvation
    /// warning. `None` disables the watchdog.
    pub starvation_threshold_ms: Option<u64>,

    /// Consecutive conflicting attempts of one transaction before a
    /// livelock warning is logged.
    pub conflict_warning_threshold: u32,
}

impl StmConfig {
    /// Parse a configuration from a TOML document
    ///
    /// Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: StmConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.starvation_threshold_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "starvation_threshold_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.conflict_warning_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "conflict_warning_threshold",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Watchdog period, if enabled
    pub fn starvation_threshold(&self) -> Option<Duration> {
        self.starvation_threshold_ms.map(Duration::from_millis)
    }
}

impl Default for StmConfig {
    fn default() -> Self {
        Self {
            starvation_threshold_ms: Some(DEFAULT_STARVATION_THRESHOLD_MS),
            conflict_warning_threshold: DEFAULT_CONFLICT_WARNING_THRESHOLD,
        }
    }
}
