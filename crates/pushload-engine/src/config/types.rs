//! Job YAML configuration types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use pushload_types::dataset::{DatasetIdentity, Scope};
use serde::Deserialize;

pub const DEFAULT_TABLES_DIR: &str = "/data/in/tables";
pub const DEFAULT_BASE_URL: &str = "https://api.powerbi.com/v1.0/myorg/";
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/token";
pub const DEFAULT_RESOURCE: &str = "https://analysis.windows.net/powerbi/api";

/// Top-level job definition.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub version: String,
    pub job: String,
    #[serde(default)]
    pub workspace: Option<String>,
    pub dataset: DatasetIdentity,
    /// Purge rows of an existing dataset's tables before loading.
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub on_schema_mismatch: SchemaMismatchPolicy,
    #[serde(default)]
    pub relationships: Vec<RelationshipLink>,
    pub input: InputConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub limits: LoadLimits,
}

impl JobConfig {
    pub fn scope(&self) -> Scope {
        Scope::new(self.workspace.as_deref())
    }
}

/// What to do when an existing dataset lacks locally defined tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMismatchPolicy {
    /// Log and keep loading into the existing dataset.
    #[default]
    Ignore,
    /// Stop the run with a schema error.
    Fail,
    /// Delete the remote dataset and create it again (name identity only).
    Recreate,
}

impl fmt::Display for SchemaMismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => f.write_str("ignore"),
            Self::Fail => f.write_str("fail"),
            Self::Recreate => f.write_str("recreate"),
        }
    }
}

/// Declarative foreign-key link between two input tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipLink {
    pub foreign_key_table: String,
    #[serde(alias = "foreign_key_column")]
    pub foreign_key_column_name: String,
    pub primary_key_table: String,
    #[serde(alias = "primary_key_column")]
    pub primary_key_column_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,
    /// Input table references, e.g. `orders.csv`.
    pub tables: Vec<String>,
}

fn default_tables_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TABLES_DIR)
}

/// Credential source for the bearer token.
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Static {
        token: String,
    },
    OauthRefresh {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_token_url")]
        token_url: String,
        #[serde(default = "default_resource")]
        resource: String,
    },
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_resource() -> String {
    DEFAULT_RESOURCE.to_string()
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static { .. } => f
                .debug_struct("Static")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::OauthRefresh {
                client_id,
                token_url,
                resource,
                ..
            } => f
                .debug_struct("OauthRefresh")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("refresh_token", &"[REDACTED]")
                .field("token_url", token_url)
                .field("resource", resource)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Batching, rate-limit, retry and polling knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadLimits {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_visibility_poll_ms")]
    pub visibility_poll_ms: u64,
    #[serde(default = "default_visibility_max_polls")]
    pub visibility_max_polls: u32,
}

impl Default for LoadLimits {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
            max_attempts: default_max_attempts(),
            visibility_poll_ms: default_visibility_poll_ms(),
            visibility_max_polls: default_visibility_max_polls(),
        }
    }
}

impl LoadLimits {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn visibility_poll_interval(&self) -> Duration {
        Duration::from_millis(self.visibility_poll_ms)
    }
}

fn default_batch_size() -> usize {
    10_000
}

fn default_requests_per_window() -> u32 {
    120
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_visibility_poll_ms() -> u64 {
    2_000
}

fn default_visibility_max_polls() -> u32 {
    30
}
