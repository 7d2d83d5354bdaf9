//! Configuration types for pgrant.
//!
//! Configuration is loaded from a single YAML file (`pgrant.yaml` by
//! convention):
//!
//! - **upstream**: how to reach the Postgres server
//! - **resolver** / **planner**: classification and revocation behaviour
//! - **batch**: fan-out limits for bulk operations
//! - **grants**: optional replacement for the built-in grant registry

pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::RegistryError;
use crate::kind::{Action, ObjectKind};
use crate::registry::{GrantDefinition, GrantRegistry, NONE_LABEL};

pub use upstream::{PoolConfig, UpstreamConfig};

/// Complete pgrant configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PgrantConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Replaces the built-in registry when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<GrantDefinitionConfig>,

    /// Label for the `NONE` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub none_label: Option<String>,
}

/// How the resolver decides that a definition is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Only the first (marker) token must be present.
    #[default]
    Marker,
    /// Every token of the definition must be present.
    FullSet,
}

/// What a transition to `NONE` revokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoneRevocation {
    /// Revoke the READ token set and rely on the gateway to cascade.
    #[default]
    Cascade,
    /// Revoke every token the registry knows for the kind.
    Explicit,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub none_revocation: NoneRevocation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on in-flight (object, principal) items.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// A grant definition as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantDefinitionConfig {
    pub object: ObjectKind,
    pub action: Action,
    pub grant: Vec<String>,
    pub label: String,
}

impl From<GrantDefinitionConfig> for GrantDefinition {
    fn from(c: GrantDefinitionConfig) -> Self {
        GrantDefinition {
            kind: c.object,
            action: c.action,
            tokens: c.grant,
            label: c.label,
        }
    }
}

fn default_max_concurrency() -> usize {
    8
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid grant registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PgrantConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_concurrency == 0 {
            return Err(ConfigError::Config(
                "batch.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the grant registry this configuration describes.
    pub fn registry(&self) -> Result<GrantRegistry, ConfigError> {
        let none_label = self.none_label.as_deref().unwrap_or(NONE_LABEL);
        if self.grants.is_empty() {
            let defaults = GrantRegistry::postgres();
            if none_label == defaults.none_label() {
                return Ok(defaults);
            }
            return Ok(GrantRegistry::from_definitions(
                defaults.definitions().to_vec(),
                none_label,
            )?);
        }
        let definitions = self.grants.iter().cloned().map(GrantDefinition::from).collect();
        Ok(GrantRegistry::from_definitions(definitions, none_label)?)
    }
}
