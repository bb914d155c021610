//! Bounded per-operation output buffer

use rscoop_types::OperationOutput;
use serde::Serialize;

/// Hard cap on buffered records
pub const MAX_OUTPUT_RECORDS: usize = 1000;
/// Buffer length at which the next append truncates first
pub const HIGH_WATER_MARK: usize = 950;
/// Records kept when truncating
pub const TRUNCATE_TAIL: usize = 50;

const _: () = assert!(TRUNCATE_TAIL < HIGH_WATER_MARK && HIGH_WATER_MARK <= MAX_OUTPUT_RECORDS);

/// Ordered output records with head eviction.
///
/// Once the buffer holds [`HIGH_WATER_MARK`] records the next append first
/// drops everything but the newest [`TRUNCATE_TAIL`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputBuffer {
    records: Vec<OperationOutput>,
    omitted: u64,
}

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, evicting the oldest records when at the high-water mark
    pub fn push(&mut self, record: OperationOutput) {
        if self.records.len() >= HIGH_WATER_MARK {
            let evict = self.records.len() - TRUNCATE_TAIL;
            self.records.drain(..evict);
            self.omitted += evict as u64;
            tracing::trace!(evicted = evict, omitted = self.omitted, "truncated output buffer");
        }
        self.records.push(record);
        debug_assert!(self.records.len() <= MAX_OUTPUT_RECORDS);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records discarded by eviction so far
    #[must_use]
    pub fn omitted(&self) -> u64 {
        self.omitted
    }

    #[must_use]
    pub fn as_slice(&self) -> &[OperationOutput] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OperationOutput> {
        self.records.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&OperationOutput> {
        self.records.last()
    }
}

impl<'a> IntoIterator for &'a OutputBuffer {
    type Item = &'a OperationOutput;
    type IntoIter = std::slice::Iter<'a, OperationOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
