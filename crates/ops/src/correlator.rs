//! Routes backend events to the operation they belong to

use crate::manager::OperationManager;
use crate::state::{COMPLETED_SUMMARY, FAILED_SUMMARY};
use rscoop_events::{BackendEvent, BackendReceiver, FinishedEvent, OutputEvent};
use rscoop_types::{OperationId, OperationOutput, OperationResult, OutputSource};
use tokio::task::JoinHandle;

/// What happened to one backend event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// Applied to its operation
    Routed,
    /// No such operation; usually a late event after removal
    Dropped,
    /// The operation had already finished
    Ignored,
}

/// Delivers backend output and completion notices to the registry
#[derive(Debug, Clone)]
pub struct EventCorrelator {
    manager: OperationManager,
}

impl EventCorrelator {
    #[must_use]
    pub fn new(manager: OperationManager) -> Self {
        Self { manager }
    }

    /// Apply a single event
    pub fn route(&self, event: BackendEvent) -> Correlation {
        match event {
            BackendEvent::Output(output) => self.route_output(output),
            BackendEvent::Finished(finished) => self.route_finished(finished),
        }
    }

    fn route_output(&self, event: OutputEvent) -> Correlation {
        let id = OperationId::from(event.operation_id);
        let source = event.source.parse().unwrap_or_else(|_| {
            tracing::trace!(operation_id = %id, source = %event.source, "unknown output source, treating as stdout");
            OutputSource::Stdout
        });
        let record = OperationOutput::new(event.line, source, self.manager.now_ms());

        if self.manager.add_operation_output(&id, record) {
            Correlation::Routed
        } else {
            tracing::trace!(operation_id = %id, "dropping output for unknown operation");
            Correlation::Dropped
        }
    }

    fn route_finished(&self, event: FinishedEvent) -> Correlation {
        let id = OperationId::from(event.operation_id);
        if !self.manager.contains(&id) {
            tracing::debug!(operation_id = %id, "dropping completion for unknown operation");
            return Correlation::Dropped;
        }

        let result = match (event.success, event.message.trim().is_empty()) {
            (true, true) => OperationResult::success(COMPLETED_SUMMARY),
            (false, true) => OperationResult::failure(FAILED_SUMMARY),
            (true, false) => OperationResult::success(event.message),
            (false, false) => OperationResult::failure(event.message),
        };

        if self.manager.set_operation_result(&id, result) {
            Correlation::Routed
        } else if self.manager.contains(&id) {
            Correlation::Ignored
        } else {
            Correlation::Dropped
        }
    }

    /// Consume the backend channel until every sender is gone
    #[must_use]
    pub fn spawn(self, mut rx: BackendReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.route(event);
            }
            tracing::debug!("backend event channel closed");
        })
    }
}
