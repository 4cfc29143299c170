//! Semantic validation for parsed job configuration values.

use anyhow::{bail, Result};
use pushload_types::dataset::IdentifyBy;

use crate::config::types::{AuthConfig, JobConfig, LoadLimits, SchemaMismatchPolicy};

fn validate_limits(limits: &LoadLimits, errors: &mut Vec<String>) {
    if limits.batch_size == 0 {
        errors.push("limits.batch_size must be at least 1".to_string());
    }
    if limits.requests_per_window == 0 {
        errors.push("limits.requests_per_window must be at least 1".to_string());
    }
    if limits.window_secs == 0 {
        errors.push("limits.window_secs must be at least 1".to_string());
    }
    if limits.max_attempts == 0 {
        errors.push("limits.max_attempts must be at least 1".to_string());
    }
    if limits.visibility_max_polls == 0 {
        errors.push("limits.visibility_max_polls must be at least 1".to_string());
    }
}

/// Validate a parsed job configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the job config.
pub fn validate_job(config: &JobConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported job version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.job.trim().is_empty() {
        errors.push("Job name must not be empty".to_string());
    }

    if config.dataset.value.trim().is_empty() {
        errors.push("Dataset configuration is missing: dataset.value must not be empty".to_string());
    }

    if config.input.tables.is_empty() {
        errors.push("No input tables configured: input.tables must not be empty".to_string());
    }
    for (i, table) in config.input.tables.iter().enumerate() {
        if table.trim().is_empty() {
            errors.push(format!("input.tables[{i}] is empty"));
        }
    }

    for (i, link) in config.relationships.iter().enumerate() {
        let fields = [
            ("foreign_key_table", &link.foreign_key_table),
            ("foreign_key_column_name", &link.foreign_key_column_name),
            ("primary_key_table", &link.primary_key_table),
            ("primary_key_column_name", &link.primary_key_column_name),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                errors.push(format!("relationships[{i}].{field} must not be empty"));
            }
        }
    }

    if config.on_schema_mismatch == SchemaMismatchPolicy::Recreate
        && config.dataset.identify_by == IdentifyBy::Id
    {
        errors.push(
            "on_schema_mismatch 'recreate' requires dataset.identify_by 'name'".to_string(),
        );
    }

    if let Some(AuthConfig::Static { token }) = &config.auth {
        if token.trim().is_empty() {
            errors.push("auth.token must not be empty".to_string());
        }
    }

    if config.api.base_url.trim().is_empty() {
        errors.push("api.base_url must not be empty".to_string());
    }

    validate_limits(&config.limits, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Job validation failed:\n  - {}", errors.join("\n  - "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_job_str;

    fn valid_yaml() -> &'static str {
        r#"
version: "1.0"
job: sales_push
dataset:
  identify_by: name
  value: Sales
input:
  tables: [orders.csv, customers.csv]
auth:
  type: static
  token: abc
"#
    }

    #[test]
    fn test_valid_job_passes() {
        let config = parse_job_str(valid_yaml()).unwrap();
        assert!(validate_job(&config).is_ok());
    }

    #[test]
    fn test_wrong_version_fails() {
        let yaml = valid_yaml().replace("\"1.0\"", "\"2.0\"");
        let config = parse_job_str(&yaml).unwrap();
        let err = validate_job(&config).unwrap_err().to_string();
        assert!(err.contains("Unsupported job version"));
    }

    #[test]
    fn test_empty_dataset_value_fails() {
        let yaml = valid_yaml().replace("value: Sales", "value: \"\"");
        let config = parse_job_str(&yaml).unwrap();
        let err = validate_job(&config).unwrap_err().to_string();
        assert!(err.contains("Dataset configuration is missing"));
    }

    #[test]
    fn test_empty_input_tables_fails() {
        let yaml = valid_yaml().replace("[orders.csv, customers.csv]", "[]");
        let config = parse_job_str(&yaml).unwrap();
        let err = validate_job(&config).unwrap_err().to_string();
        assert!(err.contains("No input tables configured"));
    }

    #[test]
    fn test_recreate_with_id_identity_fails() {
        let yaml = valid_yaml()
            .replace("identify_by: name", "identify_by: id")
            .replace("job: sales_push", "job: sales_push\non_schema_mismatch: recreate");
        let config = parse_job_str(&yaml).unwrap();
        let err = validate_job(&config).unwrap_err().to_string();
        assert!(err.contains("requires dataset.identify_by 'name'"));
    }

    #[test]
    fn test_blank_relationship_field_fails() {
        let yaml = format!(
            "{}\nrelationships:\n  - foreign_key_table: orders\n    foreign_key_column_name: \"\"\n    primary_key_table: customers\n    primary_key_column_name: id\n",
            valid_yaml().trim_end()
        );
        let config = parse_job_str(&yaml).unwrap();
        let err = validate_job(&config).unwrap_err().to_string();
        assert!(err.contains("relationships[0].foreign_key_column_name"));
    }

    #[test]
    fn test_relationship_to_unlisted_table_passes() {
        // Referential problems surface as a remote rejection at creation.
        let yaml = format!(
            "{}\nrelationships:\n  - foreign_key_table: invoices\n    foreign_key_column_name: customer_id\n    primary_key_table: nowhere\n    primary_key_column_name: id\n",
            valid_yaml().trim_end()
        );
        let config = parse_job_str(&yaml).unwrap();
        assert!(validate_job(&config).is_ok());
    }

    #[test]
    fn test_zero_limits_all_reported() {
        let yaml = format!(
            "{}\nlimits:\n  batch_size: 0\n  requests_per_window: 0\n  window_secs: 0\n  max_attempts: 0\n  visibility_max_polls: 0\n",
            valid_yaml().trim_end()
        );
        let config = parse_job_str(&yaml).unwrap();
        let err = validate_job(&config).unwrap_err().to_string();
        for field in [
            "batch_size",
            "requests_per_window",
            "window_secs",
            "max_attempts",
            "visibility_max_polls",
        ] {
            assert!(err.contains(field), "missing {field} in: {err}");
        }
    }

    #[test]
    fn test_blank_static_token_fails() {
        let yaml = valid_yaml().replace("token: abc", "token: \"  \"");
        let config = parse_job_str(&yaml).unwrap();
        let err = validate_job(&config).unwrap_err().to_string();
        assert!(err.contains("auth.token"));
    }
}
