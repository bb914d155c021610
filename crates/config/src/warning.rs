//! Multi-instance warning settings and their persistence

use crate::{constants, invalid, store};
use rscoop_errors::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// "Too many concurrent operations" warning settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultiInstanceWarningConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Active operation count at which the warning fires
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Set once the user dismisses the warning
    #[serde(default)]
    pub dismissed: bool,
}

impl Default for MultiInstanceWarningConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            threshold: default_threshold(),
            dismissed: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> u32 {
    constants::DEFAULT_WARNING_THRESHOLD
}

impl MultiInstanceWarningConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the threshold is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.threshold == 0 {
            return Err(invalid("warning.threshold", "0"));
        }
        Ok(())
    }

    /// Whether `active_count` operations should raise the warning
    #[must_use]
    pub fn should_warn(&self, active_count: usize) -> bool {
        self.enabled
            && !self.dismissed
            && u64::try_from(active_count).unwrap_or(u64::MAX) >= u64::from(self.threshold)
    }

    /// Merge a partial update.
    ///
    /// Turning `enabled` on without saying anything about `dismissed`
    /// clears a previous dismissal.
    #[must_use]
    pub fn merged(mut self, patch: &WarningPatch) -> Self {
        if let Some(enabled) = patch.enabled {
            if enabled && patch.dismissed.is_none() {
                self.dismissed = false;
            }
            self.enabled = enabled;
        }
        if let Some(threshold) = patch.threshold {
            self.threshold = threshold;
        }
        if let Some(dismissed) = patch.dismissed {
            self.dismissed = dismissed;
        }
        self
    }
}

/// Partial update of [`MultiInstanceWarningConfig`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarningPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed: Option<bool>,
}

/// File-backed store for the warning settings
#[derive(Debug, Clone)]
pub struct WarningStore {
    path: PathBuf,
}

impl WarningStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/rscoop/warning.toml`
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn at_default_path() -> Result<Self, Error> {
        Ok(Self::new(crate::config_dir()?.join(constants::WARNING_FILE)))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted settings; a missing file yields defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<MultiInstanceWarningConfig, Error> {
        self.load_or(MultiInstanceWarningConfig::default()).await
    }

    /// Read the persisted settings, using `fallback` when nothing was saved yet
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_or(
        &self,
        fallback: MultiInstanceWarningConfig,
    ) -> Result<MultiInstanceWarningConfig, Error> {
        let Some(config) = store::read::<MultiInstanceWarningConfig>(&self.path).await? else {
            tracing::debug!(path = %self.path.display(), "no saved warning settings");
            return Ok(fallback);
        };
        config.validate()?;
        Ok(config)
    }

    /// Persist the settings, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized or written.
    pub async fn save(&self, config: &MultiInstanceWarningConfig) -> Result<(), Error> {
        store::write(&self.path, config).await?;
        tracing::debug!(path = %self.path.display(), ?config, "saved warning settings");
        Ok(())
    }
}
