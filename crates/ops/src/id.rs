//! Operation id generation

use crate::clock::Clock;
use rscoop_types::OperationId;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Hex characters of random suffix (48 bits)
pub const SUFFIX_LEN: usize = 12;

/// Produces identifiers for new operations
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn generate(&self, operation_type: &str) -> OperationId;
}

/// `<type>-<epoch ms>-<random hex>` ids
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    clock: Arc<dyn Clock>,
}

impl RandomIdGenerator {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self, operation_type: &str) -> OperationId {
        generate_id(operation_type, self.clock.now_ms())
    }
}

/// Build an id for `operation_type` at `now_ms` with a fresh random suffix
#[must_use]
pub fn generate_id(operation_type: &str, now_ms: i64) -> OperationId {
    // The first 12 hex digits of a v4 uuid are all random bits
    let uuid = Uuid::new_v4().simple().to_string();
    OperationId::compose(operation_type, now_ms, &uuid[..SUFFIX_LEN])
}
