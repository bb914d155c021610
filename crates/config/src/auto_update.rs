//! Scheduled bucket refresh settings and the last-run record

use crate::{constants, store};
use rscoop_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How often buckets are refreshed automatically.
///
/// Accepts `off`, the presets `1h`, `6h`, `24h`/`1d`, `7d`/`1w`, and a
/// number of seconds either bare or as `custom:<secs>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UpdateInterval {
    #[default]
    Off,
    Every(Duration),
}

impl UpdateInterval {
    #[must_use]
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Off => None,
            Self::Every(period) => Some(period),
        }
    }

    #[must_use]
    pub fn is_off(self) -> bool {
        matches!(self, Self::Off)
    }
}

impl FromStr for UpdateInterval {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let secs = match value {
            "off" => return Ok(Self::Off),
            "1h" => 3_600,
            "6h" => 21_600,
            "24h" | "1d" => 86_400,
            "7d" | "1w" => 604_800,
            other => other
                .strip_prefix("custom:")
                .unwrap_or(other)
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "auto_update.interval".to_string(),
                    value: s.to_string(),
                })?,
        };
        Ok(Self::Every(Duration::from_secs(secs)))
    }
}

impl TryFrom<String> for UpdateInterval {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UpdateInterval> for String {
    fn from(interval: UpdateInterval) -> Self {
        interval.to_string()
    }
}

impl fmt::Display for UpdateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::Every(period) => write!(f, "{}", period.as_secs()),
        }
    }
}

/// `[auto_update]` section
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoUpdateConfig {
    #[serde(default)]
    pub interval: UpdateInterval,
    /// Run `update-all` after a successful bucket refresh
    #[serde(default)]
    pub update_all: bool,
    /// Start scheduled operations minimized and report only to the log
    #[serde(default)]
    pub silent: bool,
}

/// When the schedule last ran, in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoUpdateState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_ms: Option<i64>,
}

/// File-backed record of the last scheduled run
#[derive(Debug, Clone)]
pub struct AutoUpdateStore {
    path: PathBuf,
}

impl AutoUpdateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/rscoop/auto_update.toml`
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn at_default_path() -> Result<Self, Error> {
        Ok(Self::new(crate::config_dir()?.join(constants::AUTO_UPDATE_FILE)))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<AutoUpdateState, Error> {
        Ok(store::read(&self.path).await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub async fn save(&self, state: &AutoUpdateState) -> Result<(), Error> {
        store::write(&self.path, state).await?;
        tracing::debug!(path = %self.path.display(), last_run_ms = ?state.last_run_ms, "saved auto-update state");
        Ok(())
    }
}
