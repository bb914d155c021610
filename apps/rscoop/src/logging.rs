//! Structured logging integration for events
//!
//! Converts outbound events into tracing records with structured fields so
//! `--debug` and JSON logs carry the full operation history.

use rscoop_events::{AppEvent, AutoUpdateEvent, EventMessage, OperationEvent};
use tracing::{debug, info, trace, warn};

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();

    match &message.event {
        AppEvent::AutoUpdate(event) => match event {
            AutoUpdateEvent::RunStarted { update_all } => {
                info!(source, event_id = %meta.event_id, update_all, "Scheduled update started");
            }
            AutoUpdateEvent::StepStarted { id, operation } => {
                info!(source, operation_id = %id, %operation, "Scheduled step started");
            }
            AutoUpdateEvent::StepFailed { operation, message } => {
                warn!(source, event_id = %meta.event_id, %operation, "Scheduled step failed: {message}");
            }
            AutoUpdateEvent::RunFinished { success } => {
                info!(source, event_id = %meta.event_id, success, "Scheduled update finished");
            }
        },

        AppEvent::Operation(event) => match event {
            OperationEvent::Added { id, title } => {
                info!(source, operation_id = %id, title = %title, "Operation started");
            }
            OperationEvent::OutputAppended { id, output, omitted } => {
                trace!(
                    source,
                    operation_id = %id,
                    stream = output.source.as_str(),
                    omitted,
                    line = %output.line,
                    "Operation output"
                );
            }
            OperationEvent::Finished { id, result } if result.success => {
                info!(source, operation_id = %id, summary = %result.summary, "Operation succeeded");
            }
            OperationEvent::Finished { id, result } => {
                warn!(source, operation_id = %id, summary = %result.summary, "Operation failed");
            }
            OperationEvent::Updated { id } => {
                debug!(source, operation_id = %id, "Operation updated");
            }
            OperationEvent::MinimizeToggled { id, is_minimized } => {
                debug!(source, operation_id = %id, is_minimized, "Operation minimize toggled");
            }
            OperationEvent::Removed { id } => {
                info!(source, operation_id = %id, "Operation closed");
            }
            OperationEvent::Reaped { ids } => {
                info!(source, count = ids.len(), "Finished operations evicted");
            }
            OperationEvent::MultiInstanceWarning {
                active_count,
                threshold,
            } => {
                warn!(source, active_count, threshold, "Multiple operations running");
            }
            OperationEvent::WarningConfigChanged { config } => {
                info!(
                    source,
                    enabled = config.enabled,
                    threshold = config.threshold,
                    dismissed = config.dismissed,
                    "Warning settings changed"
                );
            }
        },
    }
}
