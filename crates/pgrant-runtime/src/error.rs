//! Error types for gateways and batch orchestration.

use pgrant_core::ObjectKind;
use pgrant_planner::{GrantOperation, PlanError};
use thiserror::Error;

/// A single gateway call failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The object reference cannot address an object of this kind.
    #[error("invalid {kind} reference: {reason}")]
    InvalidObject { kind: ObjectKind, reason: String },

    /// A privilege token was rejected before reaching the store.
    #[error("privilege '{0}' is not allowed")]
    InvalidToken(String),

    /// An object or principal name that cannot be quoted.
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Why one item of a batch failed. Recorded against that item only.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("failed to read current privileges: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Step `index` of the item's plan failed; earlier steps were applied,
    /// later ones were not issued.
    #[error("step {index} ({operation}) failed: {source}")]
    StepFailed {
        index: usize,
        operation: GrantOperation,
        #[source]
        source: GatewayError,
    },

    #[error("batch was shut down before the item ran")]
    Aborted,
}

/// Malformed batch input. Raised before anything is dispatched; a bad item
/// fails on its own as [`ItemError::Plan`].
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch is empty")]
    EmptyBatch,
}

/// Some, but not all, items of a batch failed. Callers must inspect the
/// per-item outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{failed} of {total} items failed")]
pub struct PartialBatchFailure {
    pub failed: usize,
    pub total: usize,
}
