use rscoop_types::{OperationId, OperationType};
use serde::{Deserialize, Serialize};

/// Progress of a scheduled bucket refresh.
///
/// Only emitted when the schedule is not silent; silent runs go to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AutoUpdateEvent {
    RunStarted {
        update_all: bool,
    },

    /// A step was registered and handed to the backend
    StepStarted {
        id: OperationId,
        operation: OperationType,
    },

    /// A step could not be started, or ended with an error
    StepFailed {
        operation: OperationType,
        message: String,
    },

    RunFinished {
        success: bool,
    },
}

impl AutoUpdateEvent {
    #[must_use]
    pub fn operation_id(&self) -> Option<&OperationId> {
        match self {
            Self::StepStarted { id, .. } => Some(id),
            Self::RunStarted { .. } | Self::StepFailed { .. } | Self::RunFinished { .. } => None,
        }
    }
}
