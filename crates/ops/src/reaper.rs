//! Periodic eviction of finished operations

use crate::manager::OperationManager;
use crate::task::TaskHandle;
use rscoop_config::OperationsConfig;
use rscoop_types::OperationId;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// How often the reaper runs and how long finished operations are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperConfig {
    pub interval: Duration,
    pub retention: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self::from(&OperationsConfig::default())
    }
}

impl From<&OperationsConfig> for ReaperConfig {
    fn from(config: &OperationsConfig) -> Self {
        Self {
            interval: config.reaper_interval(),
            retention: config.retention(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reaper {
    manager: OperationManager,
    config: ReaperConfig,
}

impl Reaper {
    #[must_use]
    pub fn new(manager: OperationManager, config: ReaperConfig) -> Self {
        Self { manager, config }
    }

    /// Run one sweep
    pub fn tick(&self) -> Vec<OperationId> {
        self.manager.reap_expired(self.config.retention)
    }

    /// Start sweeping every `interval` on the current runtime
    #[must_use]
    pub fn spawn(self) -> TaskHandle {
        TaskHandle::spawn("reaper", move |mut shutdown| async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {
                        self.tick();
                    }
                }
            }
            tracing::debug!("reaper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::NewOperation;
    use crate::warning::WarningCoordinator;
    use rscoop_types::OperationResult;
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = ReaperConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.retention, Duration::from_secs(300));
    }

    #[test]
    fn test_tick_respects_retention() {
        let clock = ManualClock::new(0);
        let manager = OperationManager::new(
            Arc::new(clock.clone()),
            WarningCoordinator::default(),
            None,
        );
        let id = OperationId::from("install-0-abc");
        manager
            .add_operation(NewOperation::new(id.clone(), "Installing git"))
            .unwrap();
        manager.set_operation_result(&id, OperationResult::success("ok"));

        let reaper = Reaper::new(manager.clone(), ReaperConfig::default());
        clock.advance(Duration::from_secs(300));
        assert!(reaper.tick().is_empty());
        clock.advance(Duration::from_millis(1));
        assert_eq!(reaper.tick(), vec![id]);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let reaper = Reaper::new(OperationManager::default(), ReaperConfig::default());
        let handle = reaper.spawn();
        assert!(handle.is_running());
        assert_eq!(handle.name(), "reaper");
        handle.stop().await;
    }
}
