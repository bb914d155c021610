//! Lifecycle controller: the single writer of the operation registry

use crate::clock::{duration_ms, Clock, SystemClock};
use crate::registry::{OperationRegistry, ResultOutcome};
use crate::state::{NewOperation, OperationState};
use crate::views;
use crate::warning::WarningCoordinator;
use rscoop_config::{MultiInstanceWarningConfig, WarningPatch};
use rscoop_errors::{Error, OpsError};
use rscoop_events::{EventEmitter, EventSender, OperationEvent};
use rscoop_types::{OperationId, OperationOutput, OperationPatch, OperationResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Shared handle to the operation registry.
///
/// Cloning is cheap and every clone sees the same registry. Events are
/// emitted after the registry lock is released.
#[derive(Debug, Clone)]
pub struct OperationManager {
    registry: Arc<Mutex<OperationRegistry>>,
    clock: Arc<dyn Clock>,
    warning: WarningCoordinator,
    tx: Option<EventSender>,
    /// Woken whenever an operation finishes or leaves the registry
    settled: Arc<Notify>,
}

impl Default for OperationManager {
    fn default() -> Self {
        Self::new(
            Arc::new(SystemClock),
            WarningCoordinator::default(),
            None,
        )
    }
}

impl EventEmitter for OperationManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl OperationManager {
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        warning: WarningCoordinator,
        tx: Option<EventSender>,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(OperationRegistry::new())),
            clock,
            warning,
            tx,
            settled: Arc::new(Notify::new()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, OperationRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Register a new in-progress operation
    ///
    /// # Errors
    ///
    /// Returns `OpsError::DuplicateOperation` if the id is already tracked.
    pub fn add_operation(&self, new: NewOperation) -> Result<(), OpsError> {
        let now = self.now_ms();
        let (id, title) = {
            let mut registry = self.registry();
            let state = registry.insert(new, now)?;
            (state.id().clone(), state.title().to_string())
        };

        tracing::debug!(operation_id = %id, %title, "operation added");
        self.emit_operation(OperationEvent::Added { id, title });
        self.notify_multi_instance_warning();
        Ok(())
    }

    /// Apply a partial update; returns false for unknown ids
    pub fn update_operation(&self, id: &OperationId, patch: &OperationPatch) -> bool {
        let now = self.now_ms();
        let Some(outcome) = self.registry().update(id, patch, now) else {
            tracing::trace!(operation_id = %id, "update for unknown operation ignored");
            return false;
        };

        if let Some(result) = outcome.finished {
            self.emit_finished(id, result);
        } else if outcome.changed {
            self.emit_operation(OperationEvent::Updated { id: id.clone() });
        }
        true
    }

    /// Record the terminal result.
    ///
    /// Returns true only when this call finished the operation; a second
    /// result for the same operation is ignored.
    pub fn set_operation_result(&self, id: &OperationId, result: OperationResult) -> bool {
        let now = self.now_ms();
        let outcome = self.registry().set_result(id, result.clone(), now);
        match outcome {
            ResultOutcome::Applied => {
                self.emit_finished(id, result);
                true
            }
            ResultOutcome::AlreadyTerminal => {
                tracing::debug!(operation_id = %id, "duplicate result ignored");
                false
            }
            ResultOutcome::NotFound => {
                tracing::trace!(operation_id = %id, "result for unknown operation ignored");
                false
            }
        }
    }

    /// Buffer one output record; returns false for unknown ids
    pub fn add_operation_output(&self, id: &OperationId, output: OperationOutput) -> bool {
        let now = self.now_ms();
        let omitted = self.registry().append_output(id, output.clone(), now);
        match omitted {
            Some(omitted) => {
                self.emit_operation(OperationEvent::OutputAppended {
                    id: id.clone(),
                    output,
                    omitted,
                });
                true
            }
            None => false,
        }
    }

    /// Flip the minimized flag; returns the new value
    pub fn toggle_minimize(&self, id: &OperationId) -> Option<bool> {
        let now = self.now_ms();
        let is_minimized = self.registry().toggle_minimize(id, now)?;
        self.emit_operation(OperationEvent::MinimizeToggled {
            id: id.clone(),
            is_minimized,
        });
        Some(is_minimized)
    }

    /// Drop an operation regardless of status; removing twice is harmless
    pub fn remove_operation(&self, id: &OperationId) -> bool {
        let removed = self.registry().remove(id).is_some();
        if removed {
            tracing::debug!(operation_id = %id, "operation removed");
            self.settled.notify_waiters();
            self.emit_operation(OperationEvent::Removed { id: id.clone() });
        }
        removed
    }

    /// Evict finished operations idle for longer than `retention`
    pub fn reap_expired(&self, retention: Duration) -> Vec<OperationId> {
        let now = self.now_ms();
        let mut reaped = self.registry().remove_expired(now, duration_ms(retention));
        if !reaped.is_empty() {
            reaped.sort();
            tracing::info!(count = reaped.len(), "reaped finished operations");
            self.settled.notify_waiters();
            self.emit_operation(OperationEvent::Reaped { ids: reaped.clone() });
        }
        reaped
    }

    /// Wait until `id` has a result.
    ///
    /// Returns `None` if the operation is unknown or is removed before it
    /// finishes.
    pub async fn wait_for_result(&self, id: &OperationId) -> Option<OperationResult> {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let state = self.registry().get(id).map(|op| op.result().cloned());
            match state {
                None => return None,
                Some(Some(result)) => return Some(result),
                Some(None) => notified.await,
            }
        }
    }

    /// Snapshot of all operations, oldest first
    #[must_use]
    pub fn operations(&self) -> Vec<OperationState> {
        views::sorted_by_creation(self.registry().iter())
    }

    #[must_use]
    pub fn get(&self, id: &OperationId) -> Option<OperationState> {
        self.registry().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &OperationId) -> bool {
        self.registry().contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    #[must_use]
    pub fn active_operations_count(&self) -> usize {
        views::active_operations_count(self.registry().iter())
    }

    #[must_use]
    pub fn get_active_operations(&self) -> Vec<OperationState> {
        views::active_operations(self.registry().iter())
    }

    /// Whether the multi-instance warning currently applies
    #[must_use]
    pub fn check_multi_instance_warning(&self) -> bool {
        let config = self.warning.current();
        views::check_multi_instance_warning(&config, self.active_operations_count())
    }

    fn notify_multi_instance_warning(&self) {
        let active_count = self.active_operations_count();
        let config = self.warning.current();
        if views::check_multi_instance_warning(&config, active_count) {
            tracing::info!(active_count, threshold = config.threshold, "multiple operations running");
            self.emit_operation(OperationEvent::MultiInstanceWarning {
                active_count,
                threshold: config.threshold,
            });
        }
    }

    #[must_use]
    pub fn multi_instance_warning(&self) -> MultiInstanceWarningConfig {
        self.warning.current()
    }

    /// # Errors
    ///
    /// Returns an error if the dismissal cannot be persisted.
    pub async fn dismiss_multi_instance_warning(&self) -> Result<MultiInstanceWarningConfig, Error> {
        let config = self.warning.dismiss().await?;
        self.emit_operation(OperationEvent::WarningConfigChanged { config });
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the merged settings are invalid or cannot be
    /// persisted.
    pub async fn update_multi_instance_warning(
        &self,
        patch: &WarningPatch,
    ) -> Result<MultiInstanceWarningConfig, Error> {
        let config = self.warning.apply(patch).await?;
        self.emit_operation(OperationEvent::WarningConfigChanged { config });
        Ok(config)
    }

    fn emit_finished(&self, id: &OperationId, result: OperationResult) {
        if result.success {
            tracing::info!(operation_id = %id, summary = %result.summary, "operation succeeded");
        } else {
            tracing::warn!(operation_id = %id, summary = %result.summary, "operation failed");
        }
        self.settled.notify_waiters();
        self.emit_operation(OperationEvent::Finished {
            id: id.clone(),
            result,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rscoop_events::{AppEvent, EventReceiver};
    use rscoop_types::{OperationStatus, OutputSource};

    fn manager() -> (OperationManager, ManualClock, EventReceiver) {
        let clock = ManualClock::new(1_000);
        let (tx, rx) = rscoop_events::channel();
        let manager = OperationManager::new(
            Arc::new(clock.clone()),
            WarningCoordinator::in_memory(MultiInstanceWarningConfig::default()),
            Some(tx),
        );
        (manager, clock, rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<OperationEvent> {
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let AppEvent::Operation(event) = message.event {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_add_emits_added() {
        let (manager, _clock, mut rx) = manager();
        let id = OperationId::from("install-1000-abc");
        manager
            .add_operation(NewOperation::new(id.clone(), "Installing git"))
            .unwrap();

        let events = drain(&mut rx);
        assert!(matches!(&events[..], [OperationEvent::Added { id: added, .. }] if *added == id));
        assert_eq!(manager.active_operations_count(), 1);
    }

    #[test]
    fn test_second_add_raises_warning() {
        let (manager, _clock, mut rx) = manager();
        for name in ["a", "b"] {
            manager
                .add_operation(NewOperation::new(OperationId::from(name), name))
                .unwrap();
        }
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            OperationEvent::MultiInstanceWarning { active_count: 2, threshold: 2 }
        )));
    }

    #[test]
    fn test_result_only_once() {
        let (manager, clock, mut rx) = manager();
        let id = OperationId::from("update-1000-abc");
        manager.add_operation(NewOperation::new(id.clone(), "Updating git")).unwrap();
        clock.advance(Duration::from_millis(50));

        assert!(manager.set_operation_result(&id, OperationResult::success("done")));
        assert!(!manager.set_operation_result(&id, OperationResult::failure("late")));

        let state = manager.get(&id).unwrap();
        assert_eq!(state.status(), OperationStatus::Success);
        assert_eq!(state.result().unwrap().summary, "done");
        assert_eq!(state.updated_at(), 1_050);

        let finished = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, OperationEvent::Finished { .. }))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_unknown_ids_emit_nothing() {
        let (manager, _clock, mut rx) = manager();
        let ghost = OperationId::from("ghost");
        assert!(!manager.add_operation_output(
            &ghost,
            OperationOutput::new("line", OutputSource::Stdout, 0)
        ));
        assert!(!manager.set_operation_result(&ghost, OperationResult::success("ok")));
        assert!(!manager.update_operation(&ghost, &OperationPatch::minimized(true)));
        assert!(manager.toggle_minimize(&ghost).is_none());
        assert!(!manager.remove_operation(&ghost));
        assert!(drain(&mut rx).is_empty());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_patch_status_emits_finished() {
        let (manager, _clock, mut rx) = manager();
        let id = OperationId::from("cleanup-1000-abc");
        manager.add_operation(NewOperation::new(id.clone(), "Cleaning up")).unwrap();
        drain(&mut rx);

        assert!(manager.update_operation(&id, &OperationPatch::status(OperationStatus::Error)));
        let events = drain(&mut rx);
        assert!(matches!(
            &events[..],
            [OperationEvent::Finished { result, .. }] if !result.success
        ));
    }

    #[tokio::test]
    async fn test_wait_for_result() {
        let (manager, _clock, _rx) = manager();
        let done = OperationId::from("update-buckets-1000-abc");
        let closed = OperationId::from("update-all-1000-abc");
        for id in [&done, &closed] {
            manager.add_operation(NewOperation::new(id.clone(), "op")).unwrap();
        }

        let waiter = {
            let manager = manager.clone();
            let done = done.clone();
            tokio::spawn(async move { manager.wait_for_result(&done).await })
        };
        let closed_waiter = {
            let manager = manager.clone();
            let closed = closed.clone();
            tokio::spawn(async move { manager.wait_for_result(&closed).await })
        };
        tokio::task::yield_now().await;

        manager.set_operation_result(&done, OperationResult::failure("exit code 1"));
        manager.remove_operation(&closed);
        assert_eq!(waiter.await.unwrap(), Some(OperationResult::failure("exit code 1")));
        assert_eq!(closed_waiter.await.unwrap(), None);

        // already finished, and unknown
        assert!(manager.wait_for_result(&done).await.is_some());
        assert!(manager.wait_for_result(&OperationId::from("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn test_dismiss_stops_warning() {
        let (manager, _clock, mut rx) = manager();
        manager.dismiss_multi_instance_warning().await.unwrap();
        for name in ["a", "b", "c"] {
            manager
                .add_operation(NewOperation::new(OperationId::from(name), name))
                .unwrap();
        }
        assert!(!manager.check_multi_instance_warning());
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, OperationEvent::MultiInstanceWarning { .. })));
    }
}
