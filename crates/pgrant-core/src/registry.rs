//! The grant registry: a closed table mapping (object kind, action) to the
//! privilege tokens that make up that access level and its display label.
//!
//! The registry is built once, validated, and then shared read-only (usually
//! behind an `Arc`). Lookups never fail; absence of a definition means the
//! kind has no such capability.

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::kind::{Action, ObjectKind};

pub const VIEWER_LABEL: &str = "Viewer";
pub const EDITOR_LABEL: &str = "Editor";
pub const EXECUTE_LABEL: &str = "Execute";
pub const NONE_LABEL: &str = "No Access";

/// One (object kind, action) entry of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDefinition {
    pub kind: ObjectKind,
    pub action: Action,
    /// Ordered privilege tokens; the first one is the marker used for
    /// classification.
    pub tokens: Vec<String>,
    pub label: String,
}

impl GrantDefinition {
    pub fn new(kind: ObjectKind, action: Action, tokens: &[&str], label: &str) -> Self {
        Self {
            kind,
            action,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            label: label.to_string(),
        }
    }

    /// The discriminating marker token.
    pub fn marker(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }
}

/// A row of the label surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    pub kind: ObjectKind,
    pub action: Action,
    pub label: String,
}

/// Immutable registry of grant definitions.
#[derive(Debug, Clone)]
pub struct GrantRegistry {
    definitions: Vec<GrantDefinition>,
    none_label: String,
}

impl GrantRegistry {
    /// The default Postgres mapping.
    pub fn postgres() -> Self {
        use Action::*;
        use ObjectKind::*;

        let definitions = vec![
            GrantDefinition::new(Database, Read, &["CONNECT"], VIEWER_LABEL),
            GrantDefinition::new(Database, Write, &["CREATE", "TEMPORARY"], EDITOR_LABEL),
            GrantDefinition::new(Schema, Read, &["USAGE"], VIEWER_LABEL),
            GrantDefinition::new(Schema, Write, &["CREATE"], EDITOR_LABEL),
            GrantDefinition::new(Table, Read, &["SELECT"], VIEWER_LABEL),
            GrantDefinition::new(
                Table,
                Write,
                &["INSERT", "UPDATE", "DELETE", "TRUNCATE", "REFERENCES", "TRIGGER"],
                EDITOR_LABEL,
            ),
            GrantDefinition::new(Function, Execute, &["EXECUTE"], EXECUTE_LABEL),
            GrantDefinition::new(Sequence, Read, &["SELECT"], VIEWER_LABEL),
            GrantDefinition::new(Sequence, Write, &["UPDATE", "USAGE"], EDITOR_LABEL),
            GrantDefinition::new(Type, Write, &["USAGE"], EDITOR_LABEL),
        ];

        Self {
            definitions,
            none_label: NONE_LABEL.to_string(),
        }
    }

    /// Build a registry from custom definitions, checking its invariants.
    pub fn from_definitions(
        definitions: Vec<GrantDefinition>,
        none_label: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let definitions: Vec<GrantDefinition> = definitions
            .into_iter()
            .map(|mut d| {
                d.tokens = d
                    .tokens
                    .iter()
                    .map(|t| crate::privileges::normalize_token(t))
                    .filter(|t| !t.is_empty())
                    .collect();
                d
            })
            .collect();

        for (i, def) in definitions.iter().enumerate() {
            if def.action == Action::None {
                return Err(RegistryError::NoneDefinition { kind: def.kind });
            }
            if def.tokens.is_empty() {
                return Err(RegistryError::EmptyTokens {
                    kind: def.kind,
                    action: def.action,
                });
            }
            if definitions[..i]
                .iter()
                .any(|d| d.kind == def.kind && d.action == def.action)
            {
                return Err(RegistryError::Duplicate {
                    kind: def.kind,
                    action: def.action,
                });
            }
        }

        for def in &definitions {
            let Some(marker) = def.marker() else { continue };
            if let Some(other) = definitions.iter().find(|o| {
                o.kind == def.kind && o.action != def.action && o.tokens.iter().any(|t| t == marker)
            }) {
                return Err(RegistryError::AmbiguousMarker {
                    kind: def.kind,
                    action: def.action,
                    other: other.action,
                    token: marker.to_string(),
                });
            }
        }

        Ok(Self {
            definitions,
            none_label: none_label.into(),
        })
    }

    /// All definitions for a kind, in registry order.
    pub fn definitions_for(&self, kind: ObjectKind) -> Vec<&GrantDefinition> {
        self.definitions.iter().filter(|d| d.kind == kind).collect()
    }

    pub fn definition(&self, kind: ObjectKind, action: Action) -> Option<&GrantDefinition> {
        self.definitions
            .iter()
            .find(|d| d.kind == kind && d.action == action)
    }

    pub fn definitions(&self) -> &[GrantDefinition] {
        &self.definitions
    }

    /// Whether the registry carries any definition for `kind`.
    pub fn knows(&self, kind: ObjectKind) -> bool {
        self.definitions.iter().any(|d| d.kind == kind)
    }

    /// Whether `action` is a valid target for `kind`. `NONE` is valid for
    /// every known kind.
    pub fn supports(&self, kind: ObjectKind, action: Action) -> bool {
        match action {
            Action::None => self.knows(kind),
            _ => self.definition(kind, action).is_some(),
        }
    }

    pub fn none_label(&self) -> &str {
        &self.none_label
    }

    /// Display label for a (kind, action) pair.
    pub fn label(&self, kind: ObjectKind, action: Action) -> Option<&str> {
        match action {
            Action::None => Some(self.none_label.as_str()),
            _ => self.definition(kind, action).map(|d| d.label.as_str()),
        }
    }

    /// The full label surface, `NONE` first for each kind that has
    /// definitions.
    pub fn labels(&self) -> Vec<LabelEntry> {
        let mut out = Vec::new();
        for kind in ObjectKind::ALL {
            let defs = self.definitions_for(kind);
            if defs.is_empty() {
                continue;
            }
            out.push(LabelEntry {
                kind,
                action: Action::None,
                label: self.none_label.clone(),
            });
            out.extend(defs.into_iter().map(|d| LabelEntry {
                kind,
                action: d.action,
                label: d.label.clone(),
            }));
        }
        out
    }

    /// Every token any definition of `kind` manages, deduplicated, in
    /// registry order.
    pub fn known_tokens(&self, kind: ObjectKind) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for def in self.definitions.iter().filter(|d| d.kind == kind) {
            for token in &def.tokens {
                if !out.contains(token) {
                    out.push(token.clone());
                }
            }
        }
        out
    }

    /// Marker of the `READ` definition, if the kind has one.
    pub fn read_marker(&self, kind: ObjectKind) -> Option<&str> {
        self.definition(kind, Action::Read).and_then(|d| d.marker())
    }
}

impl Default for GrantRegistry {
    fn default() -> Self {
        Self::postgres()
    }
}
