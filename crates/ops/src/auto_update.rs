//! Scheduled bucket refresh

use crate::service::Launcher;
use crate::task::TaskHandle;
use rscoop_config::{AutoUpdateConfig, AutoUpdateState, AutoUpdateStore};
use rscoop_errors::UserFacingError;
use rscoop_events::{AutoUpdateEvent, EventEmitter};
use rscoop_types::{OperationId, OperationResult, OperationType, StartRequest};
use std::time::Duration;

/// How one step of a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Finished {
        id: OperationId,
        result: OperationResult,
    },
    /// Closed by the user before it finished
    Closed { id: OperationId },
    /// Rejected before reaching the backend
    NotStarted { message: String },
}

impl StepOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Finished { result, .. } if result.success)
    }

    fn failure_message(&self) -> Option<String> {
        match self {
            Self::Finished { result, .. } if result.success => None,
            Self::Finished { result, .. } => Some(result.summary.clone()),
            Self::Closed { .. } => Some("closed before it finished".to_string()),
            Self::NotStarted { message } => Some(message.clone()),
        }
    }
}

/// Result of one scheduled run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoUpdateRun {
    pub started_at_ms: i64,
    pub buckets: StepOutcome,
    /// `None` unless `update_all` is set and the bucket refresh succeeded
    pub packages: Option<StepOutcome>,
}

impl AutoUpdateRun {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.buckets.succeeded() && self.packages.as_ref().is_none_or(StepOutcome::succeeded)
    }
}

/// Refreshes buckets through the regular operation pipeline, optionally
/// followed by `update-all`.
///
/// Steps are ordinary operations: they get ids, stream output and are
/// reaped like any other. In silent mode they start minimized and progress
/// is only logged.
#[derive(Debug, Clone)]
pub struct AutoUpdater {
    launcher: Launcher,
    config: AutoUpdateConfig,
    store: Option<AutoUpdateStore>,
}

impl AutoUpdater {
    #[must_use]
    pub fn new(launcher: Launcher, config: AutoUpdateConfig, store: Option<AutoUpdateStore>) -> Self {
        Self {
            launcher,
            config,
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AutoUpdateConfig {
        &self.config
    }

    /// Last recorded run, if a store is attached and holds one
    pub async fn last_run_ms(&self) -> Option<i64> {
        let store = self.store.as_ref()?;
        match store.load().await {
            Ok(state) => state.last_run_ms,
            Err(e) => {
                tracing::warn!(path = %store.path().display(), error = %e, "ignoring unreadable auto-update state");
                None
            }
        }
    }

    /// Refresh buckets now, then update packages if configured.
    ///
    /// The run is recorded once the bucket step ends, whether or not it
    /// succeeded, so a failing refresh is not retried immediately.
    pub async fn run_once(&self) -> AutoUpdateRun {
        let started_at_ms = self.launcher.manager().now_ms();
        tracing::info!(
            update_all = self.config.update_all,
            silent = self.config.silent,
            "scheduled update running"
        );
        self.announce(AutoUpdateEvent::RunStarted {
            update_all: self.config.update_all,
        });

        let buckets = self.run_step(OperationType::UpdateBuckets).await;
        self.record_run(started_at_ms).await;

        let packages = if self.config.update_all && buckets.succeeded() {
            Some(self.run_step(OperationType::UpdateAll).await)
        } else {
            None
        };

        let run = AutoUpdateRun {
            started_at_ms,
            buckets,
            packages,
        };
        let success = run.succeeded();
        tracing::info!(success, "scheduled update finished");
        self.announce(AutoUpdateEvent::RunFinished { success });
        run
    }

    /// Run on the configured interval until stopped; `None` when the
    /// interval is `off`
    #[must_use]
    pub fn spawn(self) -> Option<TaskHandle> {
        let interval = self.config.interval.duration()?;

        Some(TaskHandle::spawn("auto-update", move |mut shutdown| async move {
            let now_ms = self.launcher.manager().now_ms();
            let mut delay = due_in(self.last_run_ms().await, now_ms, interval);

            loop {
                tracing::debug!(delay_secs = delay.as_secs(), "next scheduled update");
                tokio::select! {
                    _ = &mut shutdown => break,
                    () = tokio::time::sleep(delay) => {}
                }
                // a run waits on its operations; stopping must not
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = self.run_once() => {}
                }
                delay = interval;
            }
            tracing::debug!("auto-update schedule stopped");
        }))
    }

    async fn run_step(&self, operation: OperationType) -> StepOutcome {
        let request = StartRequest::new(operation).with_minimized(self.config.silent);
        let outcome = match self.launcher.start_operation(&request) {
            Ok(id) => {
                self.announce(AutoUpdateEvent::StepStarted {
                    id: id.clone(),
                    operation,
                });
                match self.launcher.manager().wait_for_result(&id).await {
                    Some(result) => StepOutcome::Finished { id, result },
                    None => StepOutcome::Closed { id },
                }
            }
            Err(e) => StepOutcome::NotStarted {
                message: e.user_message().into_owned(),
            },
        };

        if let Some(message) = outcome.failure_message() {
            tracing::warn!(%operation, %message, "scheduled step failed");
            self.announce(AutoUpdateEvent::StepFailed { operation, message });
        }
        outcome
    }

    async fn record_run(&self, started_at_ms: i64) {
        let Some(store) = &self.store else {
            return;
        };
        let state = AutoUpdateState {
            last_run_ms: Some(started_at_ms),
        };
        if let Err(e) = store.save(&state).await {
            tracing::warn!(path = %store.path().display(), error = %e, "failed to record scheduled update");
        }
    }

    fn announce(&self, event: AutoUpdateEvent) {
        if !self.config.silent {
            self.launcher.manager().emit_auto_update(event);
        }
    }
}

/// Time left until a run is due. A missing record is overdue; a record in
/// the future (clock moved back) waits a full interval.
#[must_use]
pub fn due_in(last_run_ms: Option<i64>, now_ms: i64, interval: Duration) -> Duration {
    let Some(last_run_ms) = last_run_ms else {
        return Duration::ZERO;
    };
    let elapsed = u64::try_from(now_ms.saturating_sub(last_run_ms)).unwrap_or(0);
    interval.saturating_sub(Duration::from_millis(elapsed))
}
