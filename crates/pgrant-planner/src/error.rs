//! Planning errors.

use pgrant_core::{Action, ObjectKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The registry has no definitions at all for this kind.
    #[error("unknown object kind {0}: no grant definitions registered")]
    UnknownObjectKind(ObjectKind),

    /// The target action has no grant definition for this kind.
    #[error("cannot grant {target} on a {kind}")]
    UnsupportedTransition { kind: ObjectKind, target: Action },
}
