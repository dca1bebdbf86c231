//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing so that a forest is never
//! built from an out-of-range setting.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Largest accepted `failure_log_capacity`.
pub const MAX_FAILURE_LOG_CAPACITY: usize = 65_536;

/// Default number of reciprocation failures retained by a forest.
pub const DEFAULT_FAILURE_LOG_CAPACITY: usize = 64;

/// Root of the configuration document.
///
/// # Example
///
/// ```toml
/// [reciprocation]
/// failure_log_capacity = 64
/// failure_log_level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Handling of failed reciprocal calls
    pub reciprocation: Option<ReciprocationConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(reciprocation) = &self.reciprocation {
            reciprocation.validate()?;
        }
        Ok(())
    }
}

/// How failed reciprocal calls are recorded and reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReciprocationConfig {
    /// Number of most recent failures kept (0 disables recording)
    pub failure_log_capacity: Option<usize>,

    /// Tracing level used to report a failure
    pub failure_log_level: Option<FailureLogLevel>,
}

impl ReciprocationConfig {
    /// Validate the reciprocation settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(capacity) = self.failure_log_capacity {
            if capacity > MAX_FAILURE_LOG_CAPACITY {
                return Err(ConfigError::InvalidValue(format!(
                    "failure_log_capacity {} exceeds the maximum of {}",
                    capacity, MAX_FAILURE_LOG_CAPACITY
                )));
            }
        }
        Ok(())
    }
}

/// Tracing level for reciprocation failures.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureLogLevel {
    /// Do not emit an event.
    Off,
    /// Emit at `DEBUG`.
    Debug,
    /// Emit at `WARN`.
    #[default]
    Warn,
}
