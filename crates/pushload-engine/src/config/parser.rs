//! Job YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::JobConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                if !errors.iter().any(|e| e == var_name) {
                    errors.push(var_name.to_string());
                }
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", errors.join(", "));
    }

    Ok(result)
}

/// Parse a job YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_job_str(yaml_str: &str) -> Result<JobConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: JobConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse job YAML")?;
    Ok(config)
}

/// Parse a job YAML file.
///
/// A relative `input.tables_dir` is resolved against the job file's directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_job(path: &Path) -> Result<JobConfig> {
    let content = read_job_file(path)?;
    let config = parse_job_str(&content)?;
    Ok(resolve_tables_dir(config, path))
}

/// Parse a job YAML file without its `auth` section.
///
/// Variables referenced only under `auth` need not be set. For commands that
/// never contact the destination.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the YAML is invalid, or a
/// variable outside `auth` is missing.
pub fn parse_job_offline(path: &Path) -> Result<JobConfig> {
    let content = read_job_file(path)?;
    let mut doc: serde_yaml::Value =
        serde_yaml::from_str(&content).context("Failed to parse job YAML")?;
    if let Some(map) = doc.as_mapping_mut() {
        map.remove("auth");
    }
    let stripped = serde_yaml::to_string(&doc).context("Failed to re-encode job YAML")?;
    let config = parse_job_str(&stripped)?;
    Ok(resolve_tables_dir(config, path))
}

fn read_job_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file: {}", path.display()))
}

fn resolve_tables_dir(mut config: JobConfig, path: &Path) -> JobConfig {
    if config.input.tables_dir.is_relative() {
        if let Some(parent) = path.parent() {
            config.input.tables_dir = parent.join(&config.input.tables_dir);
        }
    }
    config
}
