use async_trait::async_trait;
use pgrant_core::{
    AccessChange, AccessTarget, Action, GrantRegistry, ObjectKind, ObjectRef, PrivilegeSet,
};
use pgrant_planner::{GrantOperation, PlanError, TransitionPlanner};
use pgrant_runtime::{
    AuditEvent, AuditSink, BatchError, BatchOptions, BatchOrchestrator, BatchStatus, FailureMode,
    GatewayError, ItemError, MemoryGateway, PartialBatchFailure, PrivilegeQuery,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn registry() -> Arc<GrantRegistry> {
    Arc::new(GrantRegistry::postgres())
}

fn orchestrator(gateway: MemoryGateway) -> BatchOrchestrator<MemoryGateway> {
    let registry = registry();
    BatchOrchestrator::new(
        Arc::new(gateway),
        TransitionPlanner::with_registry(registry),
        BatchOptions { max_concurrency: 4 },
    )
}

fn table(name: &str) -> ObjectRef {
    ObjectRef::qualified("public", name)
}

fn tokens_for(kind: ObjectKind, action: Action) -> Vec<String> {
    GrantRegistry::postgres()
        .definition(kind, action)
        .map(|d| d.tokens.clone())
        .unwrap_or_default()
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn test_failing_item_does_not_stop_siblings() {
    let gateway = MemoryGateway::new(registry());
    gateway.fail_pair(table("orders"), "bob", FailureMode::Mutations);
    let orch = orchestrator(gateway);

    let changes = vec![
        AccessTarget::new(ObjectKind::Table, table("orders"), "alice").change_to(Action::Read),
        AccessTarget::new(ObjectKind::Table, table("orders"), "bob").change_to(Action::Read),
        AccessTarget::new(ObjectKind::Table, table("orders"), "carol").change_to(Action::Read),
    ];
    let report = orch.apply_bulk(&changes).await.unwrap();

    assert_eq!(report.total(), 3);
    let principals: Vec<&str> = report
        .outcomes
        .iter()
        .map(|o| o.change.principal.as_str())
        .collect();
    assert_eq!(principals, vec!["alice", "bob", "carol"]);

    assert!(report.outcomes[0].result.is_ok());
    assert!(matches!(
        report.outcomes[1].result,
        Err(ItemError::StepFailed {
            index: 0,
            operation: GrantOperation::Revoke,
            ..
        })
    ));
    assert!(report.outcomes[2].result.is_ok());

    assert_eq!(report.status(), BatchStatus::PartialFailure);
    assert_eq!(
        report.partial_failure(),
        Some(PartialBatchFailure {
            failed: 1,
            total: 3
        })
    );

    let gw = orch.gateway();
    assert!(gw.privileges(ObjectKind::Table, &table("orders"), "alice").contains("SELECT"));
    assert!(gw.privileges(ObjectKind::Table, &table("orders"), "carol").contains("SELECT"));
    assert!(gw.privileges(ObjectKind::Table, &table("orders"), "bob").is_empty());
}

#[tokio::test]
async fn test_all_items_failing_is_failed_not_partial() {
    let gateway = MemoryGateway::new(registry());
    gateway.fail_pair(table("orders"), "alice", FailureMode::All);
    let orch = orchestrator(gateway);

    let changes = vec![
        AccessTarget::new(ObjectKind::Table, table("orders"), "alice").change_to(Action::Write),
    ];
    let report = orch.apply_bulk(&changes).await.unwrap();
    assert_eq!(report.status(), BatchStatus::Failed);
    assert!(report.partial_failure().is_none());
    assert!(matches!(
        report.outcomes[0].result,
        Err(ItemError::Gateway(GatewayError::Backend(_)))
    ));
}

#[tokio::test]
async fn test_aggregate_varies_when_members_disagree() {
    let gateway = MemoryGateway::new(registry())
        .with_privileges(ObjectKind::Table, table("a"), "alice", &["SELECT"])
        .with_privileges(
            ObjectKind::Table,
            table("b"),
            "alice",
            &tokens_for(ObjectKind::Table, Action::Write),
        );
    let orch = orchestrator(gateway);

    let targets = vec![
        AccessTarget::new(ObjectKind::Table, table("a"), "alice"),
        AccessTarget::new(ObjectKind::Table, table("b"), "alice"),
    ];
    let read = orch.read_aggregate(&targets).await.unwrap();

    assert_eq!(read.items.len(), 2);
    assert_eq!(read.items[0].result.as_ref().unwrap().action, Action::Read);
    assert_eq!(read.items[1].result.as_ref().unwrap().action, Action::Write);
    let aggregate = read.aggregate.unwrap();
    assert!(aggregate.is_varies());
    assert_eq!(aggregate.label(), "Varies");
}

#[tokio::test]
async fn test_aggregate_is_unknown_when_any_read_fails() {
    let gateway = MemoryGateway::new(registry())
        .with_privileges(ObjectKind::Schema, ObjectRef::new("sales"), "alice", &["USAGE"])
        .with_privileges(ObjectKind::Schema, ObjectRef::new("sales"), "bob", &["USAGE"]);
    gateway.fail_pair(ObjectRef::new("sales"), "carol", FailureMode::All);
    let orch = orchestrator(gateway);

    let targets: Vec<AccessTarget> = ["alice", "bob", "carol"]
        .into_iter()
        .map(|p| AccessTarget::new(ObjectKind::Schema, ObjectRef::new("sales"), p))
        .collect();

    let read = orch.read_aggregate(&targets).await.unwrap();
    assert_eq!(read.failed(), 1);
    assert!(read.items[2].result.is_err());
    assert!(read.aggregate.is_none());

    let read = orch.read_aggregate(&targets[..2]).await.unwrap();
    let aggregate = read.aggregate.unwrap();
    assert_eq!(aggregate.action(), Some(Action::Read));
    assert_eq!(aggregate.label(), "Viewer");
}

#[tokio::test]
async fn test_aggregate_is_none_when_every_read_fails() {
    let gateway = MemoryGateway::new(registry());
    gateway.fail_pair(table("t"), "alice", FailureMode::All);
    let orch = orchestrator(gateway);

    let read = orch
        .read_aggregate(&[AccessTarget::new(ObjectKind::Table, table("t"), "alice")])
        .await
        .unwrap();
    assert!(read.aggregate.is_none());
}

#[tokio::test]
async fn test_empty_batches_are_rejected() {
    let orch = orchestrator(MemoryGateway::new(registry()));
    assert!(matches!(orch.read_bulk(&[]).await, Err(BatchError::EmptyBatch)));
    assert!(matches!(orch.apply_bulk(&[]).await, Err(BatchError::EmptyBatch)));
    assert!(matches!(orch.preview_bulk(&[]).await, Err(BatchError::EmptyBatch)));
}

#[tokio::test]
async fn test_unsupported_item_fails_alone() {
    let orch = orchestrator(MemoryGateway::new(registry()));
    let changes = vec![
        AccessTarget::new(ObjectKind::Table, table("t"), "alice").change_to(Action::Read),
        AccessTarget::new(ObjectKind::Table, table("t"), "bob").change_to(Action::Execute),
        AccessTarget::new(ObjectKind::Table, table("t"), "carol").change_to(Action::Read),
    ];

    let report = orch.apply_bulk(&changes).await.unwrap();
    assert_eq!(report.total(), 3);
    assert!(report.outcomes[0].result.is_ok());
    match &report.outcomes[1].result {
        Err(ItemError::Plan(source)) => assert_eq!(
            *source,
            PlanError::UnsupportedTransition {
                kind: ObjectKind::Table,
                target: Action::Execute
            }
        ),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(report.outcomes[2].result.is_ok());
    assert_eq!(report.status(), BatchStatus::PartialFailure);
    assert!(orch.gateway().privileges(ObjectKind::Table, &table("t"), "alice").contains("SELECT"));
    assert!(orch.gateway().privileges(ObjectKind::Table, &table("t"), "bob").is_empty());

    let previews = orch.preview_bulk(&changes).await.unwrap();
    assert!(previews[0].result.is_ok());
    assert!(matches!(previews[1].result, Err(ItemError::Plan(_))));
}

#[tokio::test]
async fn test_every_transition_lands_on_target() {
    let registry = registry();
    let gateway = MemoryGateway::new(registry.clone());
    let mut changes = Vec::new();

    for kind in ObjectKind::ALL {
        for from in Action::ALL {
            for to in Action::ALL {
                if !registry.supports(kind, from) || !registry.supports(kind, to) {
                    continue;
                }
                let object = if kind.is_schema_scoped() {
                    ObjectRef::qualified("public", format!("{}_{}", from, to))
                } else {
                    ObjectRef::new(format!("{}_{}", from, to))
                };
                let principal = format!("{}_role", kind.as_str().to_lowercase());
                gateway.set_privileges(kind, object.clone(), &principal, &tokens_for(kind, from));
                changes.push(AccessTarget::new(kind, object, principal).change_to(to));
            }
        }
    }

    let orch = orchestrator(gateway);
    let report = orch.apply_bulk(&changes).await.unwrap();
    assert_eq!(report.status(), BatchStatus::Succeeded);

    let targets: Vec<AccessTarget> = changes.iter().map(AccessChange::access_target).collect();
    let reads = orch.read_bulk(&targets).await.unwrap();
    for (change, read) in changes.iter().zip(&reads) {
        assert_eq!(
            read.result.as_ref().unwrap().action,
            change.target,
            "{} {} -> {}",
            change.kind,
            change.object,
            change.target
        );
    }
}

#[tokio::test]
async fn test_preview_does_not_mutate() {
    let write = tokens_for(ObjectKind::Table, Action::Write);
    let gateway =
        MemoryGateway::new(registry()).with_privileges(ObjectKind::Table, table("t"), "alice", &write);
    let orch = orchestrator(gateway);

    let changes = vec![AccessTarget::new(ObjectKind::Table, table("t"), "alice").change_to(Action::Read)];
    let previews = orch.preview_bulk(&changes).await.unwrap();
    let plan = previews[0].result.as_ref().unwrap();

    assert_eq!(plan.from.action, Action::Write);
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.steps[0].operation, GrantOperation::Revoke);
    assert_eq!(plan.steps[1].operation, GrantOperation::Grant);

    let held = orch.gateway().privileges(ObjectKind::Table, &table("t"), "alice");
    assert_eq!(held.len(), write.len());
}

#[tokio::test]
async fn test_steps_are_audited() {
    let sink = Arc::new(RecordingSink::default());
    let gateway = MemoryGateway::new(registry()).with_privileges(
        ObjectKind::Table,
        table("t"),
        "alice",
        &tokens_for(ObjectKind::Table, Action::Write),
    );
    let orch = orchestrator(gateway).with_audit(sink.clone());

    let changes = vec![AccessTarget::new(ObjectKind::Table, table("t"), "alice").change_to(Action::Read)];
    let report = orch.apply_bulk(&changes).await.unwrap();

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.batch_id == report.batch_id && e.succeeded()));
    assert_eq!(events[0].operation, GrantOperation::Revoke);
    assert_eq!(events[1].operation, GrantOperation::Grant);
    assert_eq!(events[1].tokens, vec!["SELECT".to_string()]);
}

#[tokio::test]
async fn test_noop_change_issues_no_steps() {
    let sink = Arc::new(RecordingSink::default());
    let gateway = MemoryGateway::new(registry()).with_privileges(
        ObjectKind::Function,
        table("f"),
        "alice",
        &["EXECUTE"],
    );
    let orch = orchestrator(gateway).with_audit(sink.clone());

    let changes =
        vec![AccessTarget::new(ObjectKind::Function, table("f"), "alice").change_to(Action::Execute)];
    let report = orch.apply_bulk(&changes).await.unwrap();

    assert_eq!(report.outcomes[0].result.as_ref().unwrap().steps, 0);
    assert!(sink.events.lock().unwrap().is_empty());
}

/// Counts how many fetches overlap.
#[derive(Default)]
struct CountingGateway {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl PrivilegeQuery for CountingGateway {
    async fn fetch_privileges(
        &self,
        _kind: ObjectKind,
        _object: &ObjectRef,
        _principal: &str,
    ) -> Result<PrivilegeSet, GatewayError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(PrivilegeSet::new())
    }
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let gateway = Arc::new(CountingGateway::default());
    let orch = BatchOrchestrator::new(
        gateway.clone(),
        TransitionPlanner::with_registry(registry()),
        BatchOptions { max_concurrency: 2 },
    );

    let targets: Vec<AccessTarget> = (0..8)
        .map(|i| AccessTarget::new(ObjectKind::Table, table(&format!("t{i}")), "alice"))
        .collect();
    let reads = orch.read_bulk(&targets).await.unwrap();

    assert_eq!(reads.len(), 8);
    assert!(reads.iter().all(|r| r.result.is_ok()));
    assert_eq!(gateway.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_closed_orchestrator_aborts_items() {
    let orch = orchestrator(MemoryGateway::new(registry()));
    orch.close();

    let targets = vec![
        AccessTarget::new(ObjectKind::Table, table("a"), "alice"),
        AccessTarget::new(ObjectKind::Table, table("b"), "alice"),
    ];
    let reads = orch.read_bulk(&targets).await.unwrap();
    assert!(reads.iter().all(|r| matches!(r.result, Err(ItemError::Aborted))));

    let changes: Vec<AccessChange> = targets.into_iter().map(|t| t.change_to(Action::Read)).collect();
    let report = orch.apply_bulk(&changes).await.unwrap();
    assert_eq!(report.status(), BatchStatus::Failed);
    assert!(orch.gateway().privileges(ObjectKind::Table, &table("a"), "alice").is_empty());
}

fn shop() -> MemoryGateway {
    MemoryGateway::new(registry())
        .with_object(ObjectKind::Table, ObjectRef::qualified("shop", "orders"))
        .with_owned_sequence(
            ObjectRef::qualified("shop", "orders"),
            ObjectRef::qualified("shop", "orders_id_seq"),
        )
        .with_object(ObjectKind::Function, ObjectRef::qualified("shop", "total"))
}

#[tokio::test]
async fn test_table_write_propagates_to_schema_and_sequences() {
    let orch = orchestrator(shop());
    let changes = vec![
        AccessTarget::new(ObjectKind::Table, ObjectRef::qualified("shop", "orders"), "alice")
            .change_to(Action::Write),
    ];

    let expanded = orch.expand(&changes).await.unwrap();
    assert_eq!(expanded.len(), 3);
    let report = orch.apply_bulk(&expanded).await.unwrap();
    assert_eq!(report.status(), BatchStatus::Succeeded);

    let gw = orch.gateway();
    assert!(gw.privileges(ObjectKind::Schema, &ObjectRef::new("shop"), "alice").contains("USAGE"));
    let seq = gw.privileges(
        ObjectKind::Sequence,
        &ObjectRef::qualified("shop", "orders_id_seq"),
        "alice",
    );
    assert!(seq.contains("UPDATE") && seq.contains("USAGE"));
}

#[tokio::test]
async fn test_derived_schema_access_is_never_lowered() {
    let gateway = shop().with_privileges(
        ObjectKind::Schema,
        ObjectRef::new("shop"),
        "alice",
        &["USAGE", "CREATE"],
    );
    let orch = orchestrator(gateway);
    let changes = vec![
        AccessTarget::new(ObjectKind::Table, ObjectRef::qualified("shop", "orders"), "alice")
            .change_to(Action::Read),
    ];

    let report = orch.apply_bulk(&orch.expand(&changes).await.unwrap()).await.unwrap();
    let schema = report
        .outcomes
        .iter()
        .find(|o| o.change.kind == ObjectKind::Schema)
        .unwrap();
    let applied = schema.result.as_ref().unwrap();
    assert_eq!(applied.steps, 0);
    assert_eq!(applied.to, Action::Write);
    assert!(
        orch.gateway()
            .privileges(ObjectKind::Schema, &ObjectRef::new("shop"), "alice")
            .contains("CREATE")
    );
}

#[tokio::test]
async fn test_schema_none_clears_members() {
    let gateway = shop()
        .with_privileges(ObjectKind::Schema, ObjectRef::new("shop"), "bob", &["USAGE"])
        .with_privileges(
            ObjectKind::Table,
            ObjectRef::qualified("shop", "orders"),
            "bob",
            &["SELECT", "INSERT"],
        )
        .with_privileges(
            ObjectKind::Function,
            ObjectRef::qualified("shop", "total"),
            "bob",
            &["EXECUTE"],
        );
    let orch = orchestrator(gateway);
    let changes =
        vec![AccessTarget::new(ObjectKind::Schema, ObjectRef::new("shop"), "bob").change_to(Action::None)];

    let expanded = orch.expand(&changes).await.unwrap();
    let report = orch.apply_bulk(&expanded).await.unwrap();
    assert_eq!(report.status(), BatchStatus::Succeeded);

    let targets: Vec<AccessTarget> = expanded.iter().map(AccessChange::access_target).collect();
    let reads = orch.read_bulk(&targets).await.unwrap();
    assert!(reads.iter().all(|r| r.result.as_ref().unwrap().action == Action::None));
}
