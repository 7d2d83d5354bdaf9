//! Derived access states and the (object, principal) addressing types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::kind::{Action, ObjectKind};

pub const VARIES_LABEL: &str = "Varies";

/// The classification of one privilege collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessState {
    pub action: Action,
    pub label: String,
}

impl AccessState {
    pub fn new(action: Action, label: impl Into<String>) -> Self {
        Self {
            action,
            label: label.into(),
        }
    }
}

/// Combined classification of a multi-object or multi-principal selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateAccess {
    /// Every member resolved to the same action.
    Uniform(AccessState),
    /// Members disagree.
    Varies,
}

impl AggregateAccess {
    /// Fold member states. Returns `None` for an empty selection.
    pub fn from_states<'a, I>(states: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a AccessState>,
    {
        let mut iter = states.into_iter();
        let first = iter.next()?;
        if iter.all(|s| s.action == first.action) {
            Some(AggregateAccess::Uniform(first.clone()))
        } else {
            Some(AggregateAccess::Varies)
        }
    }

    pub fn action(&self) -> Option<Action> {
        match self {
            AggregateAccess::Uniform(state) => Some(state.action),
            AggregateAccess::Varies => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AggregateAccess::Uniform(state) => &state.label,
            AggregateAccess::Varies => VARIES_LABEL,
        }
    }

    pub fn is_varies(&self) -> bool {
        matches!(self, AggregateAccess::Varies)
    }
}

impl fmt::Display for AggregateAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateAccess::Uniform(state) => write!(f, "{} ({})", state.action, state.label),
            AggregateAccess::Varies => write!(f, "VARIES ({})", VARIES_LABEL),
        }
    }
}

#[derive(Serialize)]
struct AggregateRepr<'a> {
    action: &'a str,
    label: &'a str,
}

impl Serialize for AggregateAccess {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let action = match self {
            AggregateAccess::Uniform(state) => state.action.as_str(),
            AggregateAccess::Varies => "VARIES",
        };
        AggregateRepr {
            action,
            label: self.label(),
        }
        .serialize(serializer)
    }
}

/// Reference to a database object. Schema-scoped kinds carry a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ObjectRef {
    type Err = ParseError;

    /// Parses `name` or `schema.name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::InvalidObjectRef(s.to_string(), "empty name"));
        }
        match s.split_once('.') {
            None => Ok(ObjectRef::new(s)),
            Some((schema, name)) => {
                if schema.is_empty() || name.is_empty() {
                    return Err(ParseError::InvalidObjectRef(
                        s.to_string(),
                        "expected schema.name",
                    ));
                }
                if name.contains('.') {
                    return Err(ParseError::InvalidObjectRef(
                        s.to_string(),
                        "too many name parts",
                    ));
                }
                Ok(ObjectRef::qualified(schema, name))
            }
        }
    }
}

/// One (object, principal) pair to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTarget {
    pub kind: ObjectKind,
    pub object: ObjectRef,
    pub principal: String,
}

impl AccessTarget {
    pub fn new(kind: ObjectKind, object: ObjectRef, principal: impl Into<String>) -> Self {
        Self {
            kind,
            object,
            principal: principal.into(),
        }
    }

    pub fn change_to(self, target: Action) -> AccessChange {
        AccessChange {
            kind: self.kind,
            object: self.object,
            principal: self.principal,
            target,
            mode: ChangeMode::Exact,
        }
    }
}

/// How strictly a change applies its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeMode {
    /// Move to the target whatever the current level.
    #[default]
    Exact,
    /// Only raise: a pair already at or above the target is left alone.
    AtLeast,
    /// Only lower: a pair already at or below the target is left alone.
    AtMost,
}

impl ChangeMode {
    /// Whether a pair currently at `current` already satisfies `target`.
    pub fn is_satisfied(self, current: Action, target: Action) -> bool {
        match self {
            ChangeMode::Exact => current == target,
            ChangeMode::AtLeast => current >= target,
            ChangeMode::AtMost => current <= target,
        }
    }
}

/// One (object, principal) pair to move to a target action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessChange {
    pub kind: ObjectKind,
    pub object: ObjectRef,
    pub principal: String,
    pub target: Action,
    #[serde(default)]
    pub mode: ChangeMode,
}

impl AccessChange {
    pub fn with_mode(mut self, mode: ChangeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn access_target(&self) -> AccessTarget {
        AccessTarget {
            kind: self.kind,
            object: self.object.clone(),
            principal: self.principal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(action: Action) -> AccessState {
        AccessState::new(action, action.as_str())
    }

    #[test]
    fn test_aggregate_uniform() {
        let states = vec![state(Action::Read), state(Action::Read)];
        let agg = AggregateAccess::from_states(&states).unwrap();
        assert_eq!(agg.action(), Some(Action::Read));
        assert!(!agg.is_varies());
    }

    #[test]
    fn test_aggregate_varies() {
        let states = vec![state(Action::Read), state(Action::Write), state(Action::Read)];
        let agg = AggregateAccess::from_states(&states).unwrap();
        assert!(agg.is_varies());
        assert_eq!(agg.label(), "Varies");
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            serde_json::json!({"action": "VARIES", "label": "Varies"})
        );
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(AggregateAccess::from_states(&Vec::<AccessState>::new()).is_none());
    }

    #[test]
    fn test_change_mode_satisfaction() {
        assert!(ChangeMode::Exact.is_satisfied(Action::Read, Action::Read));
        assert!(!ChangeMode::Exact.is_satisfied(Action::Write, Action::Read));
        assert!(ChangeMode::AtLeast.is_satisfied(Action::Write, Action::Read));
        assert!(!ChangeMode::AtLeast.is_satisfied(Action::None, Action::Read));
        assert!(ChangeMode::AtMost.is_satisfied(Action::None, Action::Read));
        assert!(!ChangeMode::AtMost.is_satisfied(Action::Write, Action::Read));
    }

    #[test]
    fn test_change_mode_defaults_to_exact() {
        let change: AccessChange = serde_json::from_value(serde_json::json!({
            "kind": "TABLE",
            "object": {"schema": "public", "name": "t"},
            "principal": "alice",
            "target": "READ"
        }))
        .unwrap();
        assert_eq!(change.mode, ChangeMode::Exact);
    }

    #[test]
    fn test_object_ref_parse() {
        assert_eq!("orders".parse::<ObjectRef>().unwrap(), ObjectRef::new("orders"));
        assert_eq!(
            "public.orders".parse::<ObjectRef>().unwrap(),
            ObjectRef::qualified("public", "orders")
        );
        assert!("public.".parse::<ObjectRef>().is_err());
        assert!("a.b.c".parse::<ObjectRef>().is_err());
        assert!("".parse::<ObjectRef>().is_err());
        assert_eq!(ObjectRef::qualified("s", "t").to_string(), "s.t");
    }
}
