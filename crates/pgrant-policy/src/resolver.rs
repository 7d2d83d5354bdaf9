//! Grant resolution.
//!
//! Actions are tested in fixed priority order (`EXECUTE`, `WRITE`, `READ`);
//! the first whose definition is held wins, otherwise the result is `NONE`.
//! In the default [`MatchMode::Marker`] mode a definition counts as held when
//! its first token is present, so a partially applied grant still classifies
//! as that grant. [`MatchMode::FullSet`] requires the whole token list.

use pgrant_core::{
    AccessState, Action, GrantRegistry, MatchMode, ObjectKind, PrivilegeSet, TokenSource,
};
use std::sync::Arc;

/// Classifies privilege sets against a registry. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GrantResolver {
    registry: Arc<GrantRegistry>,
    match_mode: MatchMode,
}

impl GrantResolver {
    pub fn new(registry: Arc<GrantRegistry>) -> Self {
        Self {
            registry,
            match_mode: MatchMode::default(),
        }
    }

    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    pub fn registry(&self) -> &Arc<GrantRegistry> {
        &self.registry
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// Resolve a privilege set. Never fails; kinds without definitions
    /// resolve to `NONE`.
    pub fn resolve(&self, kind: ObjectKind, privileges: &PrivilegeSet) -> AccessState {
        for action in Action::BY_PRIORITY {
            let Some(def) = self.registry.definition(kind, action) else {
                continue;
            };
            let Some(marker) = def.marker() else {
                continue;
            };

            let held = match self.match_mode {
                MatchMode::Marker => privileges.contains(marker),
                MatchMode::FullSet => privileges.contains_all(&def.tokens),
            };

            if held {
                tracing::debug!(%kind, %action, marker, "privileges resolved");
                return AccessState::new(action, def.label.clone());
            }
        }

        tracing::debug!(%kind, held = privileges.len(), "no grant definition matched");
        AccessState::new(Action::None, self.registry.none_label())
    }

    /// Resolve from either a bare token list or a principal record.
    pub fn resolve_source(&self, kind: ObjectKind, source: &TokenSource) -> AccessState {
        self.resolve(kind, &source.to_privilege_set())
    }
}
