//! Pure derivations over the registry

use crate::state::OperationState;
use rscoop_config::MultiInstanceWarningConfig;

/// Number of operations occupying an indicator slot.
///
/// Minimized operations count even after they finish.
pub fn active_operations_count<'a, I>(operations: I) -> usize
where
    I: IntoIterator<Item = &'a OperationState>,
{
    operations
        .into_iter()
        .filter(|op| op.is_active())
        .count()
}

/// Active operations, oldest first
pub fn active_operations<'a, I>(operations: I) -> Vec<OperationState>
where
    I: IntoIterator<Item = &'a OperationState>,
{
    sorted_by_creation(operations.into_iter().filter(|op| op.is_active()))
}

/// Snapshot of operations, oldest first
pub fn sorted_by_creation<'a, I>(operations: I) -> Vec<OperationState>
where
    I: IntoIterator<Item = &'a OperationState>,
{
    let mut snapshot: Vec<OperationState> = operations.into_iter().cloned().collect();
    snapshot.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    snapshot
}

/// Whether the "too many concurrent operations" warning should show
#[must_use]
pub fn check_multi_instance_warning(
    config: &MultiInstanceWarningConfig,
    active_count: usize,
) -> bool {
    config.should_warn(active_count)
}
