//! Operation records tracked by the lifecycle registry

use rscoop_errors::OpsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the parts of an [`OperationId`]
pub const ID_SEPARATOR: char = '-';

/// Opaque identifier of one tracked operation.
///
/// Built from an operation-type tag, a millisecond timestamp and a random
/// suffix, e.g. `install-1718000000000-3fa9c2d41b7e`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Compose an identifier from its parts
    #[must_use]
    pub fn compose(tag: &str, timestamp_ms: i64, suffix: &str) -> Self {
        Self(format!(
            "{tag}{ID_SEPARATOR}{timestamp_ms}{ID_SEPARATOR}{suffix}"
        ))
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OperationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Stream an output line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputSource {
    Stdout,
    Stderr,
    CommandEcho,
    SuccessMarker,
    ErrorMarker,
}

impl OutputSource {
    /// Wire name of the source
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::CommandEcho => "command-echo",
            Self::SuccessMarker => "success-marker",
            Self::ErrorMarker => "error-marker",
        }
    }
}

impl fmt::Display for OutputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            "command" | "command-echo" => Ok(Self::CommandEcho),
            "success" | "success-marker" => Ok(Self::SuccessMarker),
            "error" | "error-marker" => Ok(Self::ErrorMarker),
            other => Err(format!("unknown output source: {other}")),
        }
    }
}

/// One captured output line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutput {
    pub line: String,
    pub source: OutputSource,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl OperationOutput {
    #[must_use]
    pub fn new(line: impl Into<String>, source: OutputSource, timestamp: i64) -> Self {
        Self {
            line: line.into(),
            source,
            timestamp,
        }
    }
}

/// Lifecycle status of an operation.
///
/// `InProgress` is the only non-terminal status. Once `Success` or `Error`
/// is reached no further transition is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    #[default]
    InProgress,
    Success,
    Error,
}

impl OperationStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Whether moving from `self` to `next` is a valid edge.
    ///
    /// Staying `InProgress` is allowed; every edge out of a terminal status is not.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::InProgress, _))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-progress" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(OpsError::InvalidRequest {
                operation: "status".to_string(),
                reason: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// Final outcome of an operation, set exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub summary: String,
}

impl OperationResult {
    #[must_use]
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
        }
    }

    #[must_use]
    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
        }
    }

    /// Terminal status this result maps to
    #[must_use]
    pub fn status(&self) -> OperationStatus {
        if self.success {
            OperationStatus::Success
        } else {
            OperationStatus::Error
        }
    }
}

/// Partial update merged into an existing operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_minimized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationResult>,
}

impl OperationPatch {
    #[must_use]
    pub fn status(status: OperationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn minimized(is_minimized: bool) -> Self {
        Self {
            is_minimized: Some(is_minimized),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.is_minimized.is_none() && self.result.is_none()
    }
}
