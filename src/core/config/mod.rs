//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. The file named by `$RECIPROCAL_CONFIG`, when no explicit path is given
//! 3. An explicit path passed to [`Config::load`]
//!
//! # Example
//!
//! ```
//! use reciprocal::core::config::{Config, FailureLogLevel};
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     [reciprocation]
//!     failure_log_capacity = 16
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.failure_log_capacity(), 16);
//! assert_eq!(config.failure_log_level(), FailureLogLevel::Warn);
//! ```

pub mod schema;

pub use schema::{ConfigFile, FailureLogLevel, ReciprocationConfig};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "RECIPROCAL_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Resolved configuration of a forest.
///
/// Accessor methods apply defaults for anything left unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Parsed file contents
    pub file: ConfigFile,
    /// Path the configuration was read from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `$RECIPROCAL_CONFIG` is
    /// consulted; if it names a missing file a warning is returned and
    /// defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load(path: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let source = match path {
            Some(explicit) => Some(explicit.to_path_buf()),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(value) if !value.is_empty() => {
                    let candidate = PathBuf::from(value);
                    if candidate.exists() {
                        Some(candidate)
                    } else {
                        warnings.push(ConfigWarning {
                            message: format!(
                                "{} names a missing file, using defaults",
                                CONFIG_ENV_VAR
                            ),
                            path: candidate,
                        });
                        None
                    }
                }
                _ => None,
            },
        };

        let config = match source {
            Some(path) => {
                let file = Self::read_config_file(&path)?;
                file.validate()?;
                Config {
                    file,
                    path: Some(path),
                }
            }
            None => Config::default(),
        };

        Ok(ConfigLoadResult { config, warnings })
    }

    /// Parse and validate an in-memory TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<memory>"),
            message: e.to_string(),
        })?;
        file.validate()?;
        Ok(Config { file, path: None })
    }

    /// Read and parse a config file.
    fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path the configuration was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Number of reciprocation failures a forest retains.
    ///
    /// Defaults to 64 if not configured.
    pub fn failure_log_capacity(&self) -> usize {
        self.file
            .reciprocation
            .as_ref()
            .and_then(|r| r.failure_log_capacity)
            .unwrap_or(schema::DEFAULT_FAILURE_LOG_CAPACITY)
    }

    /// Tracing level for reciprocation failures.
    ///
    /// Defaults to `warn` if not configured.
    pub fn failure_log_level(&self) -> FailureLogLevel {
        self.file
            .reciprocation
            .as_ref()
            .and_then(|r| r.failure_log_level)
            .unwrap_or_default()
    }
}
