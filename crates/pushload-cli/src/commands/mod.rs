pub mod check;
pub mod drop;
pub mod run;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use pushload_engine::auth::resolve_token;
use pushload_engine::config::parser;
use pushload_engine::config::types::JobConfig;
use pushload_engine::config::validator;
use pushload_engine::{HttpPushClient, RetryPolicy};

/// Parse and validate a job file.
pub(crate) fn load_job(job_path: &Path) -> Result<JobConfig> {
    let config = parser::parse_job(job_path)
        .with_context(|| format!("Failed to parse job: {}", job_path.display()))?;
    validated(config)
}

/// Parse and validate a job file, ignoring its credentials.
pub(crate) fn load_job_offline(job_path: &Path) -> Result<JobConfig> {
    let config = parser::parse_job_offline(job_path)
        .with_context(|| format!("Failed to parse job: {}", job_path.display()))?;
    validated(config)
}

fn validated(config: JobConfig) -> Result<JobConfig> {
    validator::validate_job(&config)?;
    tracing::info!(
        job = config.job,
        dataset = %config.dataset,
        workspace = config.workspace.as_deref(),
        tables = config.input.tables.len(),
        "Job validated"
    );
    Ok(config)
}

/// Resolve credentials and build the HTTP client for `config`.
pub(crate) async fn connect(config: &JobConfig) -> Result<HttpPushClient> {
    let http = reqwest_client(config)?;
    let token = resolve_token(config.auth.as_ref(), &http)
        .await
        .map_err(pushload_engine::LoadError::from)?;
    let client = HttpPushClient::with_client(
        http,
        &config.api,
        &config.scope(),
        token,
        RetryPolicy::from_limits(&config.limits),
    )
    .map_err(pushload_engine::LoadError::from)?;
    Ok(client)
}

fn reqwest_client(config: &JobConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.api.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}
