//! `pgrant check`: validate a config file before it is used.
//!
//! Runs the YAML through the embedded JSON Schema, then loads it and builds
//! the grant registry so semantic errors (duplicate grants, ambiguous
//! markers) surface too.

use anyhow::{Context, Result};
use pgrant_core::PgrantConfig;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

const CONFIG_SCHEMA: &str = include_str!("../../../../schemas/PgrantConfig.schema.json");

/// One problem found in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFinding {
    pub category: &'static str,
    /// JSON pointer into the document, when known.
    pub location: Option<String>,
    pub message: String,
}

impl CheckFinding {
    fn new(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            location: None,
            message: message.into(),
        }
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

pub fn check_config(content: &str) -> Result<Vec<CheckFinding>> {
    let mut findings = Vec::new();

    let document: JsonValue = match serde_yaml::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            findings.push(CheckFinding::new("yaml", format!("failed to parse YAML: {}", e)));
            return Ok(findings);
        }
    };

    let schema: JsonValue =
        serde_json::from_str(CONFIG_SCHEMA).context("embedded config schema is not JSON")?;
    let validator = jsonschema::draft202012::options()
        .build(&schema)
        .map_err(|e| anyhow::anyhow!("embedded config schema does not compile: {}", e))?;

    for error in validator.iter_errors(&document) {
        let path = error.instance_path().to_string();
        let location = if path.is_empty() { "(root)".to_string() } else { path };
        findings.push(CheckFinding::new("json-schema", error.to_string()).with_location(location));
    }
    if !findings.is_empty() {
        return Ok(findings);
    }

    match PgrantConfig::from_yaml(content) {
        Ok(config) => {
            if let Err(e) = config.registry() {
                findings.push(CheckFinding::new("registry", e.to_string()));
            }
        }
        Err(e) => findings.push(CheckFinding::new("config", e.to_string())),
    }

    Ok(findings)
}

pub fn run_check(path: &Path) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let findings = check_config(&content)?;

    if findings.is_empty() {
        println!("{}: ok", path.display());
        return Ok(());
    }

    for finding in &findings {
        match &finding.location {
            Some(location) => println!(
                "  [{}] {}: {}",
                finding.category, location, finding.message
            ),
            None => println!("  [{}] {}", finding.category, finding.message),
        }
    }
    anyhow::bail!("{} has {} error(s)", path.display(), findings.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_is_clean() {
        let findings = check_config("batch:\n  max_concurrency: 4\n").unwrap();
        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[test]
    fn test_schema_errors_carry_location() {
        let findings = check_config("batch:\n  max_concurrency: 0\n").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "json-schema");
        assert_eq!(findings[0].location.as_deref(), Some("/batch/max_concurrency"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let findings = check_config("colour: blue\n").unwrap();
        assert!(findings.iter().any(|f| f.category == "json-schema"));
    }

    #[test]
    fn test_registry_errors_are_reported() {
        let yaml = r#"
grants:
  - object: TABLE
    action: READ
    grant: [SELECT]
    label: Viewer
  - object: TABLE
    action: READ
    grant: [SELECT, INSERT]
    label: Reader
"#;
        let findings = check_config(yaml).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "registry");
    }

    #[test]
    fn test_bad_yaml() {
        let findings = check_config("grants: [").unwrap();
        assert_eq!(findings[0].category, "yaml");
    }

    #[test]
    fn test_run_check_on_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resolver:\n  match_mode: full_set").unwrap();
        assert!(run_check(file.path()).is_ok());
    }
}
