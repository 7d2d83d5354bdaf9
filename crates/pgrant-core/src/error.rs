//! Error types for parsing and registry construction.

use thiserror::Error;

use crate::kind::{Action, ObjectKind};

/// Errors raised when turning caller input into core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The object kind is not one the registry knows about.
    #[error("unknown object kind '{0}'")]
    UnknownObjectKind(String),

    /// The action name is not a known access level.
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// The object reference could not be parsed.
    #[error("invalid object reference '{0}': {1}")]
    InvalidObjectRef(String, &'static str),
}

/// Errors raised when a registry violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("grant definition {kind}/{action} has no privilege tokens")]
    EmptyTokens { kind: ObjectKind, action: Action },

    #[error("grant definition {kind}/{action} is declared more than once")]
    Duplicate { kind: ObjectKind, action: Action },

    #[error("NONE cannot carry a grant definition (kind {kind})")]
    NoneDefinition { kind: ObjectKind },

    /// A marker token also appears in another definition of the same kind,
    /// so it cannot discriminate between the two.
    #[error(
        "marker '{token}' of {kind}/{action} also appears in {kind}/{other}"
    )]
    AmbiguousMarker {
        kind: ObjectKind,
        action: Action,
        other: Action,
        token: String,
    },
}
