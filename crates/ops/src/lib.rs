#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Operation lifecycle and multi-instance coordination for rscoop
//!
//! Several package-manager commands may run at once. Each one is tracked in
//! the [`OperationManager`] registry under a unique [`OperationId`]; backend
//! output is routed to it by the [`EventCorrelator`], finished operations
//! are evicted by the [`Reaper`], and [`OperationsService`] ties these
//! together behind a single `start_operation` call. The [`AutoUpdater`]
//! refreshes buckets on a schedule through that same call.

mod auto_update;
mod backend;
mod buffer;
mod clock;
mod correlator;
mod id;
mod manager;
mod reaper;
mod registry;
mod service;
mod state;
mod task;
pub mod views;
mod warning;

pub use auto_update::{due_in, AutoUpdateRun, AutoUpdater, StepOutcome};
pub use backend::{command_args, CommandBackend, ProcessBackend};
pub use buffer::{OutputBuffer, HIGH_WATER_MARK, MAX_OUTPUT_RECORDS, TRUNCATE_TAIL};
pub use clock::{duration_ms, Clock, ManualClock, SystemClock};
pub use correlator::{Correlation, EventCorrelator};
pub use id::{generate_id, IdGenerator, RandomIdGenerator, SUFFIX_LEN};
pub use manager::OperationManager;
pub use reaper::{Reaper, ReaperConfig};
pub use registry::{OperationRegistry, ResultOutcome};
pub use service::{Launcher, OperationsService, OperationsServiceBuilder};
pub use state::{NewOperation, OperationState, PatchOutcome};
pub use task::TaskHandle;
pub use warning::WarningCoordinator;

pub use rscoop_types::{
    OperationId, OperationOutput, OperationPatch, OperationResult, OperationStatus, OperationType,
    OutputSource, StartRequest,
};
