//! Access transition planning.
//!
//! Given an object kind, the privileges a principal currently holds and a
//! target action, [`TransitionPlanner::plan`] returns the ordered REVOKE/GRANT
//! steps that reach the target. Planning is pure; executing the steps is the
//! caller's job and gateways are expected to treat both operations as
//! idempotent.
//!
//! Ordering rules:
//! - `READ`: revoke the WRITE tokens, then grant the READ tokens
//! - `WRITE`: grant the WRITE tokens
//! - `EXECUTE`: grant the EXECUTE tokens
//! - `NONE`: revoke the READ tokens (the store cascades to dependent
//!   privileges), or every known token under [`NoneRevocation::Explicit`]

pub mod error;

pub use error::PlanError;

use pgrant_core::{
    AccessState, Action, ChangeMode, GrantRegistry, NoneRevocation, ObjectKind, PrivilegeSet,
};
use pgrant_policy::GrantResolver;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrantOperation {
    Revoke,
    Grant,
}

impl fmt::Display for GrantOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantOperation::Revoke => f.write_str("REVOKE"),
            GrantOperation::Grant => f.write_str("GRANT"),
        }
    }
}

/// One step of a plan, not yet bound to an object or principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub operation: GrantOperation,
    pub kind: ObjectKind,
    pub tokens: Vec<String>,
}

impl PlanStep {
    fn revoke(kind: ObjectKind, tokens: Vec<String>) -> Self {
        Self {
            operation: GrantOperation::Revoke,
            kind,
            tokens,
        }
    }

    fn grant(kind: ObjectKind, tokens: Vec<String>) -> Self {
        Self {
            operation: GrantOperation::Grant,
            kind,
            tokens,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ON {}", self.operation, self.tokens.join(", "), self.kind)
    }
}

/// Ordered steps that move one principal from `from` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    pub kind: ObjectKind,
    pub from: AccessState,
    pub target: Action,
    pub steps: Vec<PlanStep>,
}

impl TransitionPlan {
    /// True when the principal already holds the target action.
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builds transition plans. Cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct TransitionPlanner {
    registry: Arc<GrantRegistry>,
    resolver: GrantResolver,
    none_revocation: NoneRevocation,
}

impl TransitionPlanner {
    pub fn new(registry: Arc<GrantRegistry>, resolver: GrantResolver) -> Self {
        Self {
            registry,
            resolver,
            none_revocation: NoneRevocation::default(),
        }
    }

    /// Planner with a default-mode resolver over the same registry.
    pub fn with_registry(registry: Arc<GrantRegistry>) -> Self {
        let resolver = GrantResolver::new(registry.clone());
        Self::new(registry, resolver)
    }

    pub fn with_none_revocation(mut self, none_revocation: NoneRevocation) -> Self {
        self.none_revocation = none_revocation;
        self
    }

    pub fn resolver(&self) -> &GrantResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &Arc<GrantRegistry> {
        &self.registry
    }

    /// Fail early when `target` can never be planned for `kind`.
    pub fn check_supported(&self, kind: ObjectKind, target: Action) -> Result<(), PlanError> {
        if !self.registry.knows(kind) {
            return Err(PlanError::UnknownObjectKind(kind));
        }
        if !self.registry.supports(kind, target) {
            return Err(PlanError::UnsupportedTransition { kind, target });
        }
        Ok(())
    }

    pub fn plan(
        &self,
        kind: ObjectKind,
        current: &PrivilegeSet,
        target: Action,
    ) -> Result<TransitionPlan, PlanError> {
        self.check_supported(kind, target)?;

        let from = self.resolver.resolve(kind, current);
        if from.action == target {
            tracing::debug!(%kind, %target, "already at target, nothing to plan");
            return Ok(TransitionPlan {
                kind,
                from,
                target,
                steps: Vec::new(),
            });
        }

        let steps = match target {
            Action::Read => {
                let mut steps = Vec::with_capacity(2);
                if let Some(write) = self.registry.definition(kind, Action::Write) {
                    steps.push(PlanStep::revoke(kind, write.tokens.clone()));
                }
                steps.push(PlanStep::grant(kind, self.tokens(kind, Action::Read)?));
                steps
            }
            Action::Write | Action::Execute => {
                vec![PlanStep::grant(kind, self.tokens(kind, target)?)]
            }
            Action::None => vec![PlanStep::revoke(kind, self.none_tokens(kind))],
        };

        tracing::debug!(
            %kind,
            from = %from.action,
            %target,
            steps = steps.len(),
            "planned access transition"
        );

        Ok(TransitionPlan {
            kind,
            from,
            target,
            steps,
        })
    }

    /// Plan under `mode`. A pair that already satisfies the mode keeps its
    /// current level and gets an empty plan.
    pub fn plan_change(
        &self,
        kind: ObjectKind,
        current: &PrivilegeSet,
        target: Action,
        mode: ChangeMode,
    ) -> Result<TransitionPlan, PlanError> {
        if mode == ChangeMode::Exact {
            return self.plan(kind, current, target);
        }
        self.check_supported(kind, target)?;

        let from = self.resolver.resolve(kind, current);
        if mode.is_satisfied(from.action, target) {
            tracing::debug!(%kind, %target, ?mode, from = %from.action, "level kept");
            return Ok(TransitionPlan {
                kind,
                target: from.action,
                from,
                steps: Vec::new(),
            });
        }
        self.plan(kind, current, target)
    }

    fn tokens(&self, kind: ObjectKind, action: Action) -> Result<Vec<String>, PlanError> {
        self.registry
            .definition(kind, action)
            .map(|d| d.tokens.clone())
            .ok_or(PlanError::UnsupportedTransition {
                kind,
                target: action,
            })
    }

    fn none_tokens(&self, kind: ObjectKind) -> Vec<String> {
        match (self.none_revocation, self.registry.definition(kind, Action::Read)) {
            (NoneRevocation::Cascade, Some(read)) => read.tokens.clone(),
            _ => self.registry.known_tokens(kind),
        }
    }
}
