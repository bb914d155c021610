//! Multi-instance warning state shared by the lifecycle controller

use rscoop_config::{MultiInstanceWarningConfig, WarningPatch, WarningStore};
use rscoop_errors::Error;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory warning settings with optional write-through persistence.
///
/// Updates are serialized end to end, so the file always holds the last
/// value written to memory.
#[derive(Debug, Clone, Default)]
pub struct WarningCoordinator {
    config: Arc<Mutex<MultiInstanceWarningConfig>>,
    writer: Arc<tokio::sync::Mutex<()>>,
    store: Option<WarningStore>,
}

impl WarningCoordinator {
    /// Settings that are never written to disk
    #[must_use]
    pub fn in_memory(config: MultiInstanceWarningConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            writer: Arc::default(),
            store: None,
        }
    }

    /// Load persisted settings, using `fallback` if none were saved
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be read or parsed.
    pub async fn load(store: WarningStore, fallback: MultiInstanceWarningConfig) -> Result<Self, Error> {
        let config = store.load_or(fallback).await?;
        Ok(Self {
            config: Arc::new(Mutex::new(config)),
            writer: Arc::default(),
            store: Some(store),
        })
    }

    #[must_use]
    pub fn current(&self) -> MultiInstanceWarningConfig {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn should_warn(&self, active_count: usize) -> bool {
        self.current().should_warn(active_count)
    }

    /// Suppress the warning until re-enabled
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails; the in-memory dismissal stays.
    pub async fn dismiss(&self) -> Result<MultiInstanceWarningConfig, Error> {
        self.apply(&WarningPatch {
            dismissed: Some(true),
            ..WarningPatch::default()
        })
        .await
    }

    /// Merge a partial update and persist it
    ///
    /// # Errors
    ///
    /// Returns an error if the merged settings are invalid (nothing changes)
    /// or cannot be persisted (the in-memory change stays).
    pub async fn apply(&self, patch: &WarningPatch) -> Result<MultiInstanceWarningConfig, Error> {
        let _writer = self.writer.lock().await;
        let updated = {
            let mut guard = self.config.lock().unwrap_or_else(PoisonError::into_inner);
            let merged = guard.merged(patch);
            merged.validate()?;
            *guard = merged;
            merged
        };

        if let Some(store) = &self.store {
            store.save(&updated).await?;
        }
        Ok(updated)
    }
}
