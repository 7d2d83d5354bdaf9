//! Commands that only need the registry: `labels`, `resolve` and `plan`.

use anyhow::{Context, Result};
use pgrant_core::{AccessState, Action, LabelEntry, ObjectKind, PrivilegeSet, TokenSource};
use pgrant_planner::TransitionPlan;
use std::fs;
use std::path::Path;

use super::{build_planner, load_config, parse_tokens};

pub fn run_labels(kind: Option<ObjectKind>, config: Option<&Path>, json: bool) -> Result<()> {
    let planner = build_planner(&load_config(config)?)?;
    let rows = select_labels(planner.registry().labels(), kind);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<10} {:<8} LABEL", "KIND", "ACTION");
    for row in &rows {
        println!("{:<10} {:<8} {}", row.kind.as_str(), row.action.as_str(), row.label);
    }
    Ok(())
}

fn select_labels(rows: Vec<LabelEntry>, kind: Option<ObjectKind>) -> Vec<LabelEntry> {
    match kind {
        Some(kind) => rows.into_iter().filter(|r| r.kind == kind).collect(),
        None => rows,
    }
}

pub fn run_resolve(
    kind: ObjectKind,
    tokens: Option<&str>,
    input: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let planner = build_planner(&load_config(config)?)?;

    let source = match (tokens, input) {
        (Some(raw), _) => TokenSource::Tokens(parse_tokens(raw)),
        (None, Some(path)) => read_source(path)?,
        (None, None) => anyhow::bail!("either --tokens or --input is required"),
    };

    let state = planner.resolver().resolve_source(kind, &source);
    print_state(&state, json)
}

fn read_source(path: &Path) -> Result<TokenSource> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| {
        format!(
            "{} must hold a token array or an object with `pgPrivileges`",
            path.display()
        )
    })
}

fn print_state(state: &AccessState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        println!("{} ({})", state.action, state.label);
    }
    Ok(())
}

pub fn run_plan(
    kind: ObjectKind,
    tokens: &str,
    target: Action,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let planner = build_planner(&load_config(config)?)?;
    let held: PrivilegeSet = parse_tokens(tokens).iter().collect();
    let plan = planner.plan(kind, &held, target)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(())
}

pub fn print_plan(plan: &TransitionPlan) {
    println!("{} -> {}", plan.from.action, plan.target);
    if plan.is_noop() {
        println!("  (nothing to do)");
    }
    for (i, step) in plan.steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
}
