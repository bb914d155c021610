//! Command-execution backend error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BackendError {
    #[error("failed to launch {operation}: {message}")]
    LaunchFailed { operation: String, message: String },

    #[error("event channel closed")]
    EventChannelClosed,
}

impl UserFacingError for BackendError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::LaunchFailed { .. } => {
                Some("Check that scoop is installed and reachable from PATH.")
            }
            Self::EventChannelClosed => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::LaunchFailed { .. } => "backend.launch_failed",
            Self::EventChannelClosed => "backend.event_channel_closed",
        })
    }
}
