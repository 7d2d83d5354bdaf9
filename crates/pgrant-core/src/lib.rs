//! Shared types for pgrant: object kinds, access actions, the grant registry
//! and configuration.

pub mod access;
pub mod config;
pub mod error;
pub mod kind;
pub mod privileges;
pub mod registry;

pub use access::{
    AccessChange, AccessState, AccessTarget, AggregateAccess, ChangeMode, ObjectRef,
};
pub use config::{
    BatchConfig, ConfigError, MatchMode, NoneRevocation, PgrantConfig, PlannerConfig,
    ResolverConfig, UpstreamConfig,
};
pub use error::{ParseError, RegistryError};
pub use kind::{Action, ObjectKind};
pub use privileges::{PrincipalPrivileges, PrivilegeSet, TokenSource};
pub use registry::{GrantDefinition, GrantRegistry, LabelEntry};
