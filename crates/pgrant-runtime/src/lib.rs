//! Bulk access reads and transitions over privilege gateways.

pub mod adapter;
pub mod audit;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod propagation;

pub use adapter::{ObjectCatalog, PrivilegeMutation, PrivilegeQuery};
pub use audit::{AuditEvent, AuditSink, NullAuditSink, TracingAuditSink};
pub use error::{BatchError, GatewayError, ItemError, PartialBatchFailure};
pub use memory::{FailureMode, MemoryGateway};
pub use orchestrator::{
    AggregateRead, AppliedChange, BatchOptions, BatchOrchestrator, BatchReport, BatchStatus,
    ChangeOutcome, PreviewOutcome, ReadOutcome,
};
pub use propagation::propagate;
