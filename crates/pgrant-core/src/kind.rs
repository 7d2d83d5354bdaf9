//! Object kinds and coarse access actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Category of resource an access level applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    Database,
    Schema,
    Table,
    Function,
    Sequence,
    Type,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Database,
        ObjectKind::Schema,
        ObjectKind::Table,
        ObjectKind::Function,
        ObjectKind::Sequence,
        ObjectKind::Type,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Database => "DATABASE",
            ObjectKind::Schema => "SCHEMA",
            ObjectKind::Table => "TABLE",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Type => "TYPE",
        }
    }

    /// Whether objects of this kind live inside a schema.
    pub fn is_schema_scoped(&self) -> bool {
        matches!(
            self,
            ObjectKind::Table | ObjectKind::Function | ObjectKind::Sequence | ObjectKind::Type
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ObjectKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseError::UnknownObjectKind(s.to_string()))
    }
}

/// Coarse, human-facing access level.
///
/// Variants are declared lowest priority first so the derived `Ord` matches
/// classification priority: `Execute > Write > Read > None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    None,
    Read,
    Write,
    Execute,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::None, Action::Read, Action::Write, Action::Execute];

    /// Actions the resolver tests, highest priority first. `None` is the
    /// fallback and is never tested.
    pub const BY_PRIORITY: [Action; 3] = [Action::Execute, Action::Write, Action::Read];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::None => "NONE",
            Action::Read => "READ",
            Action::Write => "WRITE",
            Action::Execute => "EXECUTE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseError::UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!("table".parse::<ObjectKind>().unwrap(), ObjectKind::Table);
        assert_eq!(" Sequence ".parse::<ObjectKind>().unwrap(), ObjectKind::Sequence);
        assert!(matches!(
            "view".parse::<ObjectKind>(),
            Err(ParseError::UnknownObjectKind(k)) if k == "view"
        ));
    }

    #[test]
    fn test_action_priority_order() {
        assert!(Action::Execute > Action::Write);
        assert!(Action::Write > Action::Read);
        assert!(Action::Read > Action::None);

        let mut sorted = Action::BY_PRIORITY.to_vec();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sorted, Action::BY_PRIORITY.to_vec());
    }

    #[test]
    fn test_serde_uses_uppercase_names() {
        assert_eq!(serde_json::to_string(&Action::Write).unwrap(), "\"WRITE\"");
        let kind: ObjectKind = serde_json::from_str("\"FUNCTION\"").unwrap();
        assert_eq!(kind, ObjectKind::Function);
    }
}
