//! `pgrant` subcommands.

pub mod access;
pub mod check;
pub mod offline;

use anyhow::{Context, Result};
use pgrant_core::{GrantRegistry, PgrantConfig};
use pgrant_planner::TransitionPlanner;
use pgrant_policy::GrantResolver;
use std::path::Path;
use std::sync::Arc;

/// Load `path`, or fall back to the built-in defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<PgrantConfig> {
    match path {
        Some(path) => PgrantConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PgrantConfig::default()),
    }
}

/// Registry and planner wired from a config.
pub fn build_planner(config: &PgrantConfig) -> Result<TransitionPlanner> {
    let registry: Arc<GrantRegistry> = Arc::new(
        config
            .registry()
            .context("config does not describe a valid grant registry")?,
    );
    let resolver = GrantResolver::new(registry.clone()).with_match_mode(config.resolver.match_mode);
    Ok(TransitionPlanner::new(registry, resolver)
        .with_none_revocation(config.planner.none_revocation))
}

/// Split a comma-separated token list, dropping blanks.
pub fn parse_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_tokens() {
        assert_eq!(parse_tokens("SELECT, insert,,"), vec!["SELECT", "insert"]);
        assert!(parse_tokens("").is_empty());
        assert!(parse_tokens(" , ").is_empty());
    }

    #[test]
    fn test_default_config_builds_planner() {
        let planner = build_planner(&load_config(None).unwrap()).unwrap();
        assert_eq!(planner.registry().labels().len(), 16);
    }
}
