//! Authoritative store of tracked operations

use crate::state::{NewOperation, OperationState, PatchOutcome};
use rscoop_errors::OpsError;
use rscoop_types::{OperationId, OperationOutput, OperationPatch, OperationResult};
use std::collections::HashMap;

/// Outcome of recording a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOutcome {
    Applied,
    /// First result already recorded; the new one was ignored
    AlreadyTerminal,
    NotFound,
}

/// Operations keyed by id.
///
/// Mutations on unknown ids are no-ops: late events for removed operations
/// are expected.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<OperationId, OperationState>,
}

impl OperationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new in-progress operation
    ///
    /// # Errors
    ///
    /// Returns `OpsError::DuplicateOperation` if the id is already present;
    /// the existing entry is left untouched.
    pub fn insert(&mut self, new: NewOperation, now_ms: i64) -> Result<&OperationState, OpsError> {
        use std::collections::hash_map::Entry;

        match self.operations.entry(new.id.clone()) {
            Entry::Occupied(_) => Err(OpsError::DuplicateOperation {
                id: new.id.to_string(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(OperationState::create(new, now_ms))),
        }
    }

    pub fn update(
        &mut self,
        id: &OperationId,
        patch: &OperationPatch,
        now_ms: i64,
    ) -> Option<PatchOutcome> {
        self.operations
            .get_mut(id)
            .map(|op| op.apply_patch(patch, now_ms))
    }

    pub fn set_result(
        &mut self,
        id: &OperationId,
        result: OperationResult,
        now_ms: i64,
    ) -> ResultOutcome {
        match self.operations.get_mut(id) {
            None => ResultOutcome::NotFound,
            Some(op) => {
                if op.set_result(result, now_ms) {
                    ResultOutcome::Applied
                } else {
                    ResultOutcome::AlreadyTerminal
                }
            }
        }
    }

    /// Buffer an output record; returns the entry's omitted count
    pub fn append_output(
        &mut self,
        id: &OperationId,
        record: OperationOutput,
        now_ms: i64,
    ) -> Option<u64> {
        self.operations.get_mut(id).map(|op| {
            op.append_output(record, now_ms);
            op.output().omitted()
        })
    }

    /// Flip the minimized flag; returns the new value
    pub fn toggle_minimize(&mut self, id: &OperationId, now_ms: i64) -> Option<bool> {
        self.operations
            .get_mut(id)
            .map(|op| op.toggle_minimize(now_ms))
    }

    pub fn remove(&mut self, id: &OperationId) -> Option<OperationState> {
        self.operations.remove(id)
    }

    /// Remove every terminal operation idle for longer than `retention_ms`
    pub fn remove_expired(&mut self, now_ms: i64, retention_ms: i64) -> Vec<OperationId> {
        let expired: Vec<OperationId> = self
            .operations
            .values()
            .filter(|op| op.is_terminal() && op.idle_ms(now_ms) > retention_ms)
            .map(|op| op.id().clone())
            .collect();
        for id in &expired {
            self.operations.remove(id);
        }
        expired
    }

    #[must_use]
    pub fn get(&self, id: &OperationId) -> Option<&OperationState> {
        self.operations.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &OperationId) -> bool {
        self.operations.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationState> {
        self.operations.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
