use chrono::{DateTime, Utc};
use pgrant_core::{ObjectKind, ObjectRef};
use pgrant_planner::GrantOperation;
use uuid::Uuid;

/// One grant or revoke issued on behalf of a batch.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub batch_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: ObjectKind,
    pub object: ObjectRef,
    pub principal: String,
    pub operation: GrantOperation,
    pub tokens: Vec<String>,
    /// Error text when the gateway rejected the call.
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits every event as a structured `tracing` record under the
/// `pgrant::audit` target.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let tokens = event.tokens.join(",");
        match &event.error {
            None => tracing::info!(
                target: "pgrant::audit",
                batch_id = %event.batch_id,
                occurred_at = %event.occurred_at.to_rfc3339(),
                kind = %event.kind,
                object = %event.object,
                principal = %event.principal,
                operation = %event.operation,
                tokens = %tokens,
                "privilege change applied"
            ),
            Some(error) => tracing::warn!(
                target: "pgrant::audit",
                batch_id = %event.batch_id,
                occurred_at = %event.occurred_at.to_rfc3339(),
                kind = %event.kind,
                object = %event.object,
                principal = %event.principal,
                operation = %event.operation,
                tokens = %tokens,
                error = %error,
                "privilege change failed"
            ),
        }
    }
}

pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}
