use serde::{Deserialize, Serialize};

use crate::EventSource;
use rscoop_types::OperationId;

pub mod auto_update;
pub mod operation;

pub use auto_update::*;
pub use operation::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Scheduled bucket refresh progress
    AutoUpdate(AutoUpdateEvent),

    /// Operation registry changes
    Operation(OperationEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::AutoUpdate(_) => EventSource::AutoUpdate,
            Self::Operation(OperationEvent::Reaped { .. }) => EventSource::Reaper,
            Self::Operation(
                OperationEvent::MultiInstanceWarning { .. }
                | OperationEvent::WarningConfigChanged { .. },
            ) => EventSource::Warning,
            Self::Operation(_) => EventSource::Operations,
        }
    }

    /// Operation the event is correlated with
    #[must_use]
    pub fn operation_id(&self) -> Option<&OperationId> {
        match self {
            Self::AutoUpdate(event) => event.operation_id(),
            Self::Operation(event) => event.operation_id(),
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::Operation(OperationEvent::Finished { result, .. }) if !result.success => {
                Level::WARN
            }
            Self::AutoUpdate(
                AutoUpdateEvent::StepFailed { .. } | AutoUpdateEvent::RunFinished { success: false },
            )
            | Self::Operation(OperationEvent::MultiInstanceWarning { .. }) => Level::WARN,

            Self::Operation(OperationEvent::Updated { .. } | OperationEvent::MinimizeToggled { .. }) => {
                Level::DEBUG
            }

            // Output lines are the highest-volume events
            Self::Operation(OperationEvent::OutputAppended { .. }) => Level::TRACE,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::AutoUpdate(_) => "rscoop::events::auto_update",
            Self::Operation(_) => "rscoop::events::operation",
        }
    }
}
