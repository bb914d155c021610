//! Events produced by the command-execution backend

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// One line of command output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEvent {
    pub operation_id: String,
    pub line: String,
    /// Raw source name as reported by the backend ("stdout", "stderr", ...)
    pub source: String,
}

/// Command completion notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedEvent {
    pub operation_id: String,
    pub success: bool,
    pub message: String,
}

/// Inbound event from the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum BackendEvent {
    Output(OutputEvent),
    Finished(FinishedEvent),
}

impl BackendEvent {
    #[must_use]
    pub fn output(
        operation_id: impl Into<String>,
        line: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self::Output(OutputEvent {
            operation_id: operation_id.into(),
            line: line.into(),
            source: source.into(),
        })
    }

    #[must_use]
    pub fn finished(
        operation_id: impl Into<String>,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self::Finished(FinishedEvent {
            operation_id: operation_id.into(),
            success,
            message: message.into(),
        })
    }

    /// Operation the event belongs to
    #[must_use]
    pub fn operation_id(&self) -> &str {
        match self {
            Self::Output(event) => &event.operation_id,
            Self::Finished(event) => &event.operation_id,
        }
    }
}

pub type BackendSender = UnboundedSender<BackendEvent>;
pub type BackendReceiver = UnboundedReceiver<BackendEvent>;

/// Create the channel the backend publishes on
#[must_use]
pub fn backend_channel() -> (BackendSender, BackendReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
