use chrono::{DateTime, Utc};
use futures::future::join_all;
use pgrant_core::{AccessChange, AccessState, AccessTarget, Action, AggregateAccess, BatchConfig};
use pgrant_planner::{GrantOperation, TransitionPlan, TransitionPlanner};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::adapter::{ObjectCatalog, PrivilegeMutation, PrivilegeQuery};
use crate::audit::{AuditEvent, AuditSink, NullAuditSink};
use crate::error::{BatchError, GatewayError, ItemError, PartialBatchFailure};
use crate::propagation::propagate;

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Items in flight at once. Zero is treated as one.
    pub max_concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchConfig::default().into()
    }
}

impl From<BatchConfig> for BatchOptions {
    fn from(config: BatchConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
        }
    }
}

#[derive(Debug)]
pub struct ReadOutcome {
    pub target: AccessTarget,
    pub result: Result<AccessState, ItemError>,
}

#[derive(Debug)]
pub struct AggregateRead {
    pub items: Vec<ReadOutcome>,
    /// `None` unless every item was read: a failed member could hold
    /// anything, so no uniform level can be claimed.
    pub aggregate: Option<AggregateAccess>,
}

impl AggregateRead {
    pub fn failed(&self) -> usize {
        self.items.iter().filter(|o| o.result.is_err()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub from: AccessState,
    pub to: Action,
    pub steps: usize,
}

#[derive(Debug)]
pub struct ChangeOutcome {
    pub change: AccessChange,
    pub result: Result<AppliedChange, ItemError>,
}

#[derive(Debug)]
pub struct PreviewOutcome {
    pub change: AccessChange,
    pub result: Result<TransitionPlan, ItemError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Succeeded,
    PartialFailure,
    Failed,
}

#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ChangeOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.total() - self.failed()
    }

    pub fn status(&self) -> BatchStatus {
        match self.failed() {
            0 => BatchStatus::Succeeded,
            n if n == self.total() => BatchStatus::Failed,
            _ => BatchStatus::PartialFailure,
        }
    }

    /// `Some` only when some, but not all, items failed.
    pub fn partial_failure(&self) -> Option<PartialBatchFailure> {
        match self.status() {
            BatchStatus::PartialFailure => Some(PartialBatchFailure {
                failed: self.failed(),
                total: self.total(),
            }),
            _ => None,
        }
    }
}

/// Fans bulk reads and transitions out over a gateway.
///
/// Every item runs independently: a failing item never cancels or rolls back
/// its siblings, and results come back in input order, one per item.
pub struct BatchOrchestrator<G> {
    gateway: Arc<G>,
    planner: TransitionPlanner,
    limiter: Semaphore,
    audit: Arc<dyn AuditSink>,
}

impl<G: PrivilegeQuery> BatchOrchestrator<G> {
    pub fn new(gateway: Arc<G>, planner: TransitionPlanner, options: BatchOptions) -> Self {
        Self {
            gateway,
            planner,
            limiter: Semaphore::new(options.max_concurrency.max(1)),
            audit: Arc::new(NullAuditSink),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn planner(&self) -> &TransitionPlanner {
        &self.planner
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Stop admitting items. Items already holding a slot run to completion;
    /// queued and later ones fail with [`ItemError::Aborted`].
    pub fn close(&self) {
        tracing::info!("closing orchestrator, queued items will be aborted");
        self.limiter.close();
    }

    pub async fn read_bulk(&self, targets: &[AccessTarget]) -> Result<Vec<ReadOutcome>, BatchError> {
        if targets.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        tracing::debug!(items = targets.len(), "reading access in bulk");

        let outcomes = join_all(targets.iter().map(|target| async move {
            ReadOutcome {
                target: target.clone(),
                result: self.read_one(target).await,
            }
        }))
        .await;

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            tracing::warn!(failed, total = outcomes.len(), "bulk read had failing items");
        }
        Ok(outcomes)
    }

    pub async fn read_aggregate(&self, targets: &[AccessTarget]) -> Result<AggregateRead, BatchError> {
        let items = self.read_bulk(targets).await?;
        let states: Option<Vec<&AccessState>> =
            items.iter().map(|o| o.result.as_ref().ok()).collect();
        let aggregate = states.and_then(AggregateAccess::from_states);
        Ok(AggregateRead { items, aggregate })
    }

    /// Fetch and plan every change without touching the store.
    pub async fn preview_bulk(&self, changes: &[AccessChange]) -> Result<Vec<PreviewOutcome>, BatchError> {
        if changes.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        Ok(join_all(changes.iter().map(|change| async move {
            PreviewOutcome {
                change: change.clone(),
                result: self.preview_one(change).await,
            }
        }))
        .await)
    }

    async fn read_one(&self, target: &AccessTarget) -> Result<AccessState, ItemError> {
        let _permit = self.limiter.acquire().await.map_err(|_| ItemError::Aborted)?;
        let held = self
            .gateway
            .fetch_privileges(target.kind, &target.object, &target.principal)
            .await?;
        Ok(self.planner.resolver().resolve(target.kind, &held))
    }

    async fn preview_one(&self, change: &AccessChange) -> Result<TransitionPlan, ItemError> {
        self.planner.check_supported(change.kind, change.target)?;
        let _permit = self.limiter.acquire().await.map_err(|_| ItemError::Aborted)?;
        let held = self
            .gateway
            .fetch_privileges(change.kind, &change.object, &change.principal)
            .await?;
        Ok(self
            .planner
            .plan_change(change.kind, &held, change.target, change.mode)?)
    }
}

impl<G: PrivilegeQuery + ObjectCatalog> BatchOrchestrator<G> {
    /// Add the changes dependent objects need; see [`propagate`].
    pub async fn expand(&self, changes: &[AccessChange]) -> Result<Vec<AccessChange>, GatewayError> {
        propagate(self.gateway.as_ref(), changes).await
    }
}

impl<G: PrivilegeQuery + PrivilegeMutation> BatchOrchestrator<G> {
    /// Move every (object, principal) pair to its target action.
    pub async fn apply_bulk(&self, changes: &[AccessChange]) -> Result<BatchReport, BatchError> {
        if changes.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%batch_id, items = changes.len(), "applying access changes");

        let outcomes = join_all(changes.iter().map(|change| async move {
            ChangeOutcome {
                change: change.clone(),
                result: self.apply_one(batch_id, change).await,
            }
        }))
        .await;

        let report = BatchReport {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        tracing::info!(
            %batch_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "access changes settled"
        );
        Ok(report)
    }

    async fn apply_one(&self, batch_id: Uuid, change: &AccessChange) -> Result<AppliedChange, ItemError> {
        self.planner.check_supported(change.kind, change.target)?;
        let _permit = self.limiter.acquire().await.map_err(|_| ItemError::Aborted)?;

        let held = self
            .gateway
            .fetch_privileges(change.kind, &change.object, &change.principal)
            .await?;
        let plan = self
            .planner
            .plan_change(change.kind, &held, change.target, change.mode)?;

        for (index, step) in plan.steps.iter().enumerate() {
            let result = match step.operation {
                GrantOperation::Grant => {
                    self.gateway
                        .grant(change.kind, &change.object, &change.principal, &step.tokens)
                        .await
                }
                GrantOperation::Revoke => {
                    self.gateway
                        .revoke(change.kind, &change.object, &change.principal, &step.tokens)
                        .await
                }
            };

            self.audit.record(AuditEvent {
                batch_id,
                occurred_at: Utc::now(),
                kind: change.kind,
                object: change.object.clone(),
                principal: change.principal.clone(),
                operation: step.operation,
                tokens: step.tokens.clone(),
                error: result.as_ref().err().map(|e| e.to_string()),
            });

            if let Err(source) = result {
                tracing::warn!(
                    %batch_id,
                    object = %change.object,
                    principal = %change.principal,
                    step = index,
                    error = %source,
                    "step failed, skipping the rest of the item"
                );
                return Err(ItemError::StepFailed {
                    index,
                    operation: step.operation,
                    source,
                });
            }
        }

        Ok(AppliedChange {
            from: plan.from,
            to: plan.target,
            steps: plan.steps.len(),
        })
    }
}
