//! `show` and `set`: bulk reads and transitions against the upstream database.

use anyhow::{Context, Result};
use pgrant_adapter_pg::{PostgresGateway, introspect};
use pgrant_core::{AccessChange, AccessTarget, Action, ObjectKind, ObjectRef};
use pgrant_runtime::{BatchOrchestrator, BatchStatus, TracingAuditSink};
use serde_json::json;
use std::sync::Arc;

use super::offline::print_plan;
use super::{build_planner, load_config};
use crate::Selection;

async fn connect(selection: &Selection) -> Result<BatchOrchestrator<PostgresGateway>> {
    let config = load_config(Some(&selection.config))?;
    let planner = build_planner(&config)?;
    let gateway = PostgresGateway::connect(&config.upstream, planner.registry().clone())
        .await
        .context("failed to connect to upstream database")?;
    Ok(BatchOrchestrator::new(
        Arc::new(gateway),
        planner,
        config.batch.into(),
    ))
}

async fn select_targets(
    selection: &Selection,
    orchestrator: &BatchOrchestrator<PostgresGateway>,
) -> Result<Vec<AccessTarget>> {
    let objects = if selection.objects.is_empty() {
        if selection.kind.is_schema_scoped() && selection.in_schema.is_none() {
            anyhow::bail!("--object or --in-schema is required for {}", selection.kind);
        }
        introspect::list_objects(
            orchestrator.gateway().pool(),
            selection.kind,
            selection.in_schema.as_deref(),
        )
        .await?
        .objects
    } else {
        qualify_objects(selection.kind, &selection.objects, selection.in_schema.as_deref())?
    };

    if objects.is_empty() {
        anyhow::bail!("no {} objects matched the selection", selection.kind);
    }
    Ok(cross_targets(selection.kind, &objects, &selection.principals))
}

/// Parse object names, putting unqualified names of schema-scoped kinds into
/// `in_schema`.
fn qualify_objects(
    kind: ObjectKind,
    names: &[String],
    in_schema: Option<&str>,
) -> Result<Vec<ObjectRef>> {
    names
        .iter()
        .map(|raw| -> Result<ObjectRef> {
            let mut object: ObjectRef = raw.parse()?;
            if kind.is_schema_scoped() && object.schema.is_none() {
                let schema = in_schema.with_context(|| {
                    format!("'{}' needs a schema: use schema.name or --in-schema", raw)
                })?;
                object.schema = Some(schema.to_string());
            }
            Ok(object)
        })
        .collect()
}

/// Every object paired with every principal, objects outermost.
fn cross_targets(kind: ObjectKind, objects: &[ObjectRef], principals: &[String]) -> Vec<AccessTarget> {
    objects
        .iter()
        .flat_map(|object| {
            principals
                .iter()
                .map(move |principal| AccessTarget::new(kind, object.clone(), principal.clone()))
        })
        .collect()
}

fn status_str(status: BatchStatus) -> &'static str {
    match status {
        BatchStatus::Succeeded => "succeeded",
        BatchStatus::PartialFailure => "partial_failure",
        BatchStatus::Failed => "failed",
    }
}

pub async fn run_show(selection: &Selection, aggregate: bool, json: bool) -> Result<()> {
    let orchestrator = connect(selection).await?;
    let targets = select_targets(selection, &orchestrator).await?;
    let read = orchestrator.read_aggregate(&targets).await?;

    if json {
        let items: Vec<_> = read
            .items
            .iter()
            .map(|item| match &item.result {
                Ok(state) => json!({
                    "object": item.target.object.to_string(),
                    "principal": item.target.principal,
                    "action": state.action,
                    "label": state.label,
                }),
                Err(e) => json!({
                    "object": item.target.object.to_string(),
                    "principal": item.target.principal,
                    "error": e.to_string(),
                }),
            })
            .collect();
        let mut out = json!({ "kind": selection.kind, "items": items });
        if aggregate {
            out["aggregate"] = serde_json::to_value(&read.aggregate)?;
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for item in &read.items {
            match &item.result {
                Ok(state) => println!(
                    "{}  {}  {} ({})",
                    item.target.object, item.target.principal, state.action, state.label
                ),
                Err(e) => println!(
                    "{}  {}  error: {}",
                    item.target.object, item.target.principal, e
                ),
            }
        }
        if aggregate {
            match &read.aggregate {
                Some(agg) => println!("aggregate: {}", agg),
                None => println!("aggregate: unknown ({} unreadable)", read.failed()),
            }
        }
    }

    let failed = read.failed();
    if failed > 0 {
        anyhow::bail!("{} of {} reads failed", failed, read.items.len());
    }
    Ok(())
}

pub async fn run_set(
    selection: &Selection,
    action: Action,
    dry_run: bool,
    propagate: bool,
    json: bool,
) -> Result<()> {
    let orchestrator = connect(selection).await?;
    let mut changes: Vec<AccessChange> = select_targets(selection, &orchestrator)
        .await?
        .into_iter()
        .map(|t| t.change_to(action))
        .collect();
    if propagate {
        changes = orchestrator
            .expand(&changes)
            .await
            .context("failed to look up dependent objects")?;
    }

    if dry_run {
        return preview(&orchestrator, &changes, json).await;
    }

    let orchestrator = orchestrator.with_audit(Arc::new(TracingAuditSink));
    let apply = orchestrator.apply_bulk(&changes);
    tokio::pin!(apply);
    let report = tokio::select! {
        report = &mut apply => report?,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, waiting for items already running");
            orchestrator.close();
            apply.await?
        }
    };

    if json {
        let items: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(applied) => json!({
                    "kind": o.change.kind,
                    "object": o.change.object.to_string(),
                    "principal": o.change.principal,
                    "from": applied.from,
                    "to": applied.to,
                    "steps": applied.steps,
                }),
                Err(e) => json!({
                    "kind": o.change.kind,
                    "object": o.change.object.to_string(),
                    "principal": o.change.principal,
                    "error": e.to_string(),
                }),
            })
            .collect();
        let out = json!({
            "batch_id": report.batch_id.to_string(),
            "started_at": report.started_at.to_rfc3339(),
            "finished_at": report.finished_at.to_rfc3339(),
            "status": status_str(report.status()),
            "items": items,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("batch {}", report.batch_id);
        for o in &report.outcomes {
            match &o.result {
                Ok(applied) => println!(
                    "{} {}  {}  {} -> {} ({} steps)",
                    o.change.kind,
                    o.change.object,
                    o.change.principal,
                    applied.from.action,
                    applied.to,
                    applied.steps
                ),
                Err(e) => println!(
                    "{} {}  {}  error: {}",
                    o.change.kind, o.change.object, o.change.principal, e
                ),
            }
        }
        println!(
            "{}: {} succeeded, {} failed",
            status_str(report.status()),
            report.succeeded(),
            report.failed()
        );
    }

    if let Some(partial) = report.partial_failure() {
        return Err(partial.into());
    }
    if report.status() == BatchStatus::Failed {
        anyhow::bail!("all {} items failed", report.total());
    }
    Ok(())
}

async fn preview(
    orchestrator: &BatchOrchestrator<PostgresGateway>,
    changes: &[AccessChange],
    json: bool,
) -> Result<()> {
    let previews = orchestrator.preview_bulk(changes).await?;

    if json {
        let items: Vec<_> = previews
            .iter()
            .map(|p| match &p.result {
                Ok(plan) => json!({
                    "kind": p.change.kind,
                    "object": p.change.object.to_string(),
                    "principal": p.change.principal,
                    "plan": plan,
                }),
                Err(e) => json!({
                    "kind": p.change.kind,
                    "object": p.change.object.to_string(),
                    "principal": p.change.principal,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "dry_run": true, "items": items }))?);
    } else {
        for p in &previews {
            println!("{} {}  {}", p.change.kind, p.change.object, p.change.principal);
            match &p.result {
                Ok(plan) => print_plan(plan),
                Err(e) => println!("  error: {}", e),
            }
        }
    }

    let failed = previews.iter().filter(|p| p.result.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} items could not be planned", failed, previews.len());
    }
    Ok(())
}
