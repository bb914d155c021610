#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for rscoop
//!
//! This crate provides the vocabulary shared by the operation lifecycle
//! crates: identifiers, statuses, output records and start requests.

pub mod operation;
pub mod request;

// Re-export commonly used types
pub use operation::{
    OperationId, OperationOutput, OperationPatch, OperationResult, OperationStatus, OutputSource,
};
pub use request::{OperationType, StartRequest};

use serde::{Deserialize, Serialize};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    #[default]
    Tty,
    Json,
}
