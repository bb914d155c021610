//! Operation lifecycle error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum OpsError {
    #[error("operation already exists: {id}")]
    DuplicateOperation { id: String },

    #[error("could not allocate a unique operation id after {attempts} attempts")]
    IdSpaceExhausted { attempts: u32 },

    #[error("invalid request for {operation}: {reason}")]
    InvalidRequest { operation: String, reason: String },

    #[error("unknown operation type: {value}")]
    UnknownOperationType { value: String },

    #[error("component not found: {component}")]
    MissingComponent { component: String },
}

impl UserFacingError for OpsError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DuplicateOperation { .. } | Self::IdSpaceExhausted { .. } => {
                Some("Start the operation again; a fresh identifier will be generated.")
            }
            Self::InvalidRequest { .. } => Some("Provide a package name for this operation."),
            Self::UnknownOperationType { .. } => Some(
                "Use one of: install, uninstall, update, force-update, clear-cache, update-all, cleanup, cleanup-cache, update-buckets.",
            ),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateOperation { .. } | Self::IdSpaceExhausted { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::DuplicateOperation { .. } => "ops.duplicate_operation",
            Self::IdSpaceExhausted { .. } => "ops.id_space_exhausted",
            Self::InvalidRequest { .. } => "ops.invalid_request",
            Self::UnknownOperationType { .. } => "ops.unknown_operation_type",
            Self::MissingComponent { .. } => "ops.missing_component",
        })
    }
}
