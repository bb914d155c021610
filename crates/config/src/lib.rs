#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for rscoop
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/rscoop/config.toml)
//! - Environment variables
//! - CLI flags
//!
//! Two pieces of state survive a restart, each in its own file: the
//! multi-instance warning settings ([`WarningStore`]) and the time of the
//! last scheduled bucket refresh ([`AutoUpdateStore`]).

pub mod auto_update;
pub mod constants;
mod store;
pub mod warning;

pub use auto_update::{AutoUpdateConfig, AutoUpdateState, AutoUpdateStore, UpdateInterval};
pub use warning::{MultiInstanceWarningConfig, WarningPatch, WarningStore};

use rscoop_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub operations: OperationsConfig,

    #[serde(default)]
    pub warning: MultiInstanceWarningConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub auto_update: AutoUpdateConfig,
}

/// Operation lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationsConfig {
    /// How long a finished operation is kept before the reaper evicts it
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Reaper tick interval
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
    /// Id regeneration attempts before giving up on a collision
    #[serde(default = "default_max_id_attempts")]
    pub max_id_attempts: u32,
}

/// Command-execution backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    #[serde(default = "default_program")]
    pub program: String,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            max_id_attempts: default_max_id_attempts(),
        }
    }
}

impl OperationsConfig {
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

// Default value functions for serde
fn default_retention_secs() -> u64 {
    constants::DEFAULT_RETENTION_SECS
}

fn default_reaper_interval_secs() -> u64 {
    constants::DEFAULT_REAPER_INTERVAL_SECS
}

fn default_max_id_attempts() -> u32 {
    3
}

fn default_program() -> String {
    "scoop".to_string()
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        Ok(config_dir()?.join(constants::CONFIG_FILE))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(retention) = std::env::var("RSCOOP_RETENTION_SECS") {
            self.operations.retention_secs =
                retention.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "RSCOOP_RETENTION_SECS".to_string(),
                    value: retention,
                })?;
        }

        if let Ok(interval) = std::env::var("RSCOOP_REAPER_INTERVAL_SECS") {
            self.operations.reaper_interval_secs =
                interval.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "RSCOOP_REAPER_INTERVAL_SECS".to_string(),
                    value: interval,
                })?;
        }

        if let Ok(interval) = std::env::var("RSCOOP_AUTO_UPDATE_INTERVAL") {
            self.auto_update.interval = interval.parse()?;
        }

        if let Ok(program) = std::env::var("RSCOOP_SCOOP_PATH") {
            if program.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "RSCOOP_SCOOP_PATH".to_string(),
                    value: program,
                }
                .into());
            }
            self.backend.program = program;
        }

        self.validate()
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first out-of-range field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.operations.reaper_interval_secs == 0 {
            return Err(invalid("operations.reaper_interval_secs", "0"));
        }
        if self.operations.max_id_attempts == 0 {
            return Err(invalid("operations.max_id_attempts", "0"));
        }
        self.warning.validate()
    }
}

/// Directory holding rscoop configuration files
///
/// # Errors
///
/// Returns an error if the system config directory cannot be determined.
pub fn config_dir() -> Result<PathBuf, Error> {
    let dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
        path: "config directory".to_string(),
    })?;
    Ok(dir.join(constants::APP_DIR))
}

pub(crate) fn invalid(field: &str, value: impl Into<String>) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
    }
    .into()
}
