use rscoop_config::MultiInstanceWarningConfig;
use rscoop_types::{OperationId, OperationOutput, OperationResult};
use serde::{Deserialize, Serialize};

/// Registry change notifications
///
/// Renderers recompute their derived views when one of these arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationEvent {
    /// A new operation entered the registry
    Added {
        id: OperationId,
        title: String,
    },

    /// An output record was buffered for an operation
    OutputAppended {
        id: OperationId,
        output: OperationOutput,
        /// Records discarded by eviction so far
        omitted: u64,
    },

    /// An operation reached a terminal status
    Finished {
        id: OperationId,
        result: OperationResult,
    },

    /// Non-terminal fields of an operation changed
    Updated {
        id: OperationId,
    },

    MinimizeToggled {
        id: OperationId,
        is_minimized: bool,
    },

    /// The user closed an operation
    Removed {
        id: OperationId,
    },

    /// The reaper evicted finished operations past retention
    Reaped {
        ids: Vec<OperationId>,
    },

    /// Too many operations are active at once
    MultiInstanceWarning {
        active_count: usize,
        threshold: u32,
    },

    WarningConfigChanged {
        config: MultiInstanceWarningConfig,
    },
}

impl OperationEvent {
    /// Operation the event concerns, if it names exactly one
    #[must_use]
    pub fn operation_id(&self) -> Option<&OperationId> {
        match self {
            Self::Added { id, .. }
            | Self::OutputAppended { id, .. }
            | Self::Finished { id, .. }
            | Self::Updated { id }
            | Self::MinimizeToggled { id, .. }
            | Self::Removed { id } => Some(id),
            Self::Reaped { .. }
            | Self::MultiInstanceWarning { .. }
            | Self::WarningConfigChanged { .. } => None,
        }
    }
}
