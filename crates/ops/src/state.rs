//! The operation aggregate

use crate::buffer::OutputBuffer;
use rscoop_types::{OperationId, OperationOutput, OperationPatch, OperationResult, OperationStatus};
use serde::Serialize;

/// Summary used when a terminal status arrives without an explicit result
pub(crate) const COMPLETED_SUMMARY: &str = "Operation completed";
pub(crate) const FAILED_SUMMARY: &str = "Operation failed";

/// Fields supplied when registering an operation; timestamps are assigned
/// by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    pub id: OperationId,
    pub title: String,
    pub is_minimized: bool,
}

impl NewOperation {
    #[must_use]
    pub fn new(id: OperationId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            is_minimized: false,
        }
    }

    #[must_use]
    pub fn minimized(mut self, is_minimized: bool) -> Self {
        self.is_minimized = is_minimized;
        self
    }
}

/// One tracked operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    id: OperationId,
    title: String,
    status: OperationStatus,
    is_minimized: bool,
    output: OutputBuffer,
    result: Option<OperationResult>,
    created_at: i64,
    updated_at: i64,
}

/// What merging a patch changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub changed: bool,
    /// Set when the patch moved the operation to a terminal status
    pub finished: Option<OperationResult>,
}

impl OperationState {
    #[must_use]
    pub(crate) fn create(new: NewOperation, now_ms: i64) -> Self {
        Self {
            id: new.id,
            title: new.title,
            status: OperationStatus::InProgress,
            is_minimized: new.is_minimized,
            output: OutputBuffer::new(),
            result: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    #[must_use]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    #[must_use]
    pub fn is_minimized(&self) -> bool {
        self.is_minimized
    }

    #[must_use]
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    #[must_use]
    pub fn result(&self) -> Option<&OperationResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// In progress, or parked in a minimized indicator
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == OperationStatus::InProgress || self.is_minimized
    }

    /// Milliseconds since the last mutation
    #[must_use]
    pub fn idle_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.updated_at)
    }

    // updated_at never moves backwards or below created_at, even if the
    // clock does
    fn touch(&mut self, now_ms: i64) {
        self.updated_at = self.updated_at.max(now_ms);
    }

    pub(crate) fn append_output(&mut self, record: OperationOutput, now_ms: i64) {
        self.output.push(record);
        self.touch(now_ms);
    }

    /// Record the final result. Returns `false` if a result was already set.
    pub(crate) fn set_result(&mut self, result: OperationResult, now_ms: i64) -> bool {
        let next = result.status();
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.result = Some(result);
        self.touch(now_ms);
        true
    }

    pub(crate) fn toggle_minimize(&mut self, now_ms: i64) -> bool {
        self.is_minimized = !self.is_minimized;
        self.touch(now_ms);
        self.is_minimized
    }

    /// Merge a partial update.
    ///
    /// Status and result are only accepted while in progress; an explicit
    /// result takes precedence over a bare status.
    pub(crate) fn apply_patch(&mut self, patch: &OperationPatch, now_ms: i64) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();

        if let Some(is_minimized) = patch.is_minimized {
            if is_minimized != self.is_minimized {
                self.is_minimized = is_minimized;
                outcome.changed = true;
            }
        }

        let result = patch.result.clone().or_else(|| match patch.status {
            Some(OperationStatus::Success) => Some(OperationResult::success(COMPLETED_SUMMARY)),
            Some(OperationStatus::Error) => Some(OperationResult::failure(FAILED_SUMMARY)),
            Some(OperationStatus::InProgress) | None => None,
        });
        if let Some(result) = result {
            if self.set_result(result.clone(), now_ms) {
                outcome.changed = true;
                outcome.finished = Some(result);
            }
        }

        if outcome.changed {
            self.touch(now_ms);
        }
        outcome
    }
}
