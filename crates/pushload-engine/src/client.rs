//! Outbound push API: the [`PushApi`] seam and its HTTP implementation.

use std::time::Duration;

use pushload_types::dataset::{
    CreatedDataset, DatasetList, DatasetPayload, DatasetSummary, Scope, TableList,
};
use pushload_types::error::PushError;
use pushload_types::rows::RowBatch;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode, Url};

use crate::auth::BearerToken;
use crate::config::types::{ApiConfig, LoadLimits};
use crate::errors::compute_backoff;

/// Remote dataset operations used by the reconciler and the ingestion
/// pipeline. Every call either succeeds or returns a terminal [`PushError`].
#[allow(async_fn_in_trait)]
pub trait PushApi {
    /// All datasets visible in the configured scope.
    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>, PushError>;

    /// Create a push dataset and return its assigned identifier.
    async fn create_dataset(&self, payload: &DatasetPayload) -> Result<String, PushError>;

    /// Table names of an existing dataset.
    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>, PushError>;

    async fn append_rows(
        &self,
        dataset_id: &str,
        table: &str,
        batch: &RowBatch,
    ) -> Result<(), PushError>;

    async fn delete_rows(&self, dataset_id: &str, table: &str) -> Result<(), PushError>;

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), PushError>;
}

/// Transport retry settings for timeouts and connection failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_limits(limits: &LoadLimits) -> Self {
        Self {
            max_attempts: limits.max_attempts.max(1),
            base_delay: Duration::from_secs(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_limits(&LoadLimits::default())
    }
}

/// `reqwest`-backed [`PushApi`].
#[derive(Debug, Clone)]
pub struct HttpPushClient {
    http: reqwest::Client,
    datasets_url: Url,
    token: BearerToken,
    retry: RetryPolicy,
}

/// Status and fully read body of one exchange.
struct Reply {
    status: StatusCode,
    body: String,
}

impl HttpPushClient {
    /// # Errors
    ///
    /// Returns an `internal` error if the HTTP client cannot be built, or a
    /// `config` error if `api.base_url` is not a usable base URL.
    pub fn new(
        api: &ApiConfig,
        scope: &Scope,
        token: BearerToken,
        retry: RetryPolicy,
    ) -> Result<Self, PushError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()
            .map_err(|e| {
                PushError::internal("HTTP_CLIENT_INIT", format!("failed to build HTTP client: {e}"))
            })?;
        Self::with_client(http, api, scope, token, retry)
    }

    /// Build around an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns a `config` error if `api.base_url` is not a usable base URL.
    pub fn with_client(
        http: reqwest::Client,
        api: &ApiConfig,
        scope: &Scope,
        token: BearerToken,
        retry: RetryPolicy,
    ) -> Result<Self, PushError> {
        Ok(Self {
            http,
            datasets_url: datasets_url(api, scope)?,
            token,
            retry,
        })
    }

    /// `datasets/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.datasets_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Send a request and read its body, retrying timeouts, connection
    /// failures and interrupted bodies with exponential backoff. Any fully
    /// read response, whatever its status, ends the loop.
    async fn send(
        &self,
        operation: &'static str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Reply, PushError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = build().header(AUTHORIZATION, self.token.header_value());
            let outcome = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    response.text().await.map(|body| Reply { status, body })
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(reply) => return Ok(reply),
                Err(e) if is_transient(&e) && attempt < self.retry.max_attempts => {
                    let delay = compute_backoff(self.retry.base_delay, attempt);
                    #[allow(clippy::cast_possible_truncation)]
                    let delay_ms = delay.as_millis() as u64;
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms,
                        error = %e,
                        "Transport error, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(operation, attempt, error = %e, "Transport error, giving up");
                    return Err(PushError::transient_network(
                        "TRANSPORT_ERROR",
                        format!("{operation} failed after {attempt} attempt(s): {e}"),
                    ));
                }
            }
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body()
}

/// `{base_url}[/groups/{workspace}]/datasets`.
fn datasets_url(api: &ApiConfig, scope: &Scope) -> Result<Url, PushError> {
    let invalid = |reason: String| {
        PushError::config(
            "INVALID_BASE_URL",
            format!("api.base_url '{}' {reason}", api.base_url),
        )
    };
    let mut url =
        Url::parse(&api.base_url).map_err(|e| invalid(format!("is not a valid URL: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| invalid("cannot be used as a base URL".to_string()))?;
        path.pop_if_empty();
        if let Some(workspace) = scope.workspace() {
            path.push("groups").push(workspace);
        }
        path.push("datasets");
    }
    Ok(url)
}

/// Best-effort `error.message` from a destination error body.
fn remote_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(serde_json::Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}

fn body_details(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str, operation: &str) -> Result<T, PushError> {
    serde_json::from_str(body).map_err(|e| {
        PushError::remote(
            "MALFORMED_RESPONSE",
            format!("{operation} returned an unreadable body: {e}"),
        )
    })
}

fn list_datasets_error(status: StatusCode) -> PushError {
    let code = status.as_u16();
    match code {
        400 => PushError::remote(
            "MALFORMED_REQUEST",
            format!("{code} - Malformed request while listing datasets"),
        ),
        401 => PushError::auth(
            "UNAUTHORIZED",
            format!("{code} - Authorization failed. Please check account privileges."),
        ),
        403 => PushError::permission(
            "UNAUTHORIZED",
            format!("{code} - Authorization failed. Please check account privileges."),
        ),
        500 => PushError::remote(
            "REMOTE_INTERNAL_ERROR",
            format!("{code} - Internal error while listing datasets"),
        ),
        _ => PushError::remote(
            "LIST_DATASETS_FAILED",
            format!("{code} - Unexpected status while listing datasets"),
        ),
    }
    .with_status(code)
}

impl PushApi for HttpPushClient {
    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>, PushError> {
        let reply = self
            .send("list_datasets", || self.http.get(self.datasets_url.clone()))
            .await?;
        if reply.status != StatusCode::OK {
            return Err(list_datasets_error(reply.status));
        }
        let list: DatasetList = parse_json(&reply.body, "list_datasets")?;
        Ok(list.value)
    }

    async fn create_dataset(&self, payload: &DatasetPayload) -> Result<String, PushError> {
        let reply = self
            .send("create_dataset", || {
                self.http.post(self.datasets_url.clone()).json(payload)
            })
            .await?;
        if reply.status != StatusCode::CREATED {
            let code = reply.status.as_u16();
            let message = remote_message(&reply.body).unwrap_or_else(|| reply.body.clone());
            return Err(PushError::remote(
                "DATASET_CREATE_REJECTED",
                format!("{code} - dataset creation rejected: {message}"),
            )
            .with_status(code)
            .with_details(body_details(&reply.body)));
        }
        let created: CreatedDataset = parse_json(&reply.body, "create_dataset")?;
        Ok(created.id)
    }

    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>, PushError> {
        let url = self.endpoint(&[dataset_id, "tables"]);
        let reply = self.send("list_tables", || self.http.get(url.clone())).await?;
        if !reply.status.is_success() {
            return Err(PushError::remote(
                "LIST_TABLES_FAILED",
                format!("{} - table listing failed", reply.status.as_u16()),
            )
            .with_status(reply.status.as_u16()));
        }
        let list: TableList = parse_json(&reply.body, "list_tables")?;
        Ok(list.value.into_iter().map(|t| t.name).collect())
    }

    async fn append_rows(
        &self,
        dataset_id: &str,
        table: &str,
        batch: &RowBatch,
    ) -> Result<(), PushError> {
        let url = self.endpoint(&[dataset_id, "tables", table, "rows"]);
        let body = batch.as_request();
        let reply = self
            .send("append_rows", || self.http.post(url.clone()).json(&body))
            .await?;
        if reply.status == StatusCode::OK {
            return Ok(());
        }
        if reply.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PushError::rate_limit(
                "RATE_LIMITED",
                format!(
                    "429 - posting rows to {table} was throttled; check the push dataset API limits"
                ),
            )
            .with_status(429));
        }
        let code = reply.status.as_u16();
        let message = remote_message(&reply.body)
            .unwrap_or_else(|| format!("unknown error: {}", reply.body));
        Err(PushError::remote(
            "ROWS_REJECTED",
            format!("{code} - posting rows to {table} failed: {message}"),
        )
        .with_status(code)
        .with_details(serde_json::json!({
            "table": table,
            "offset": batch.offset(),
            "rows": batch.len(),
        })))
    }

    async fn delete_rows(&self, dataset_id: &str, table: &str) -> Result<(), PushError> {
        let url = self.endpoint(&[dataset_id, "tables", table, "rows"]);
        let reply = self.send("delete_rows", || self.http.delete(url.clone())).await?;
        if reply.status == StatusCode::OK {
            return Ok(());
        }
        let code = reply.status.as_u16();
        let message = remote_message(&reply.body).unwrap_or(reply.body);
        Err(PushError::remote(
            "ROWS_DELETE_FAILED",
            format!("{code} - deleting rows from {table} failed: {message}"),
        )
        .with_status(code))
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), PushError> {
        let url = self.endpoint(&[dataset_id]);
        let reply = self
            .send("delete_dataset", || self.http.delete(url.clone()))
            .await?;
        if reply.status == StatusCode::OK {
            return Ok(());
        }
        let code = reply.status.as_u16();
        let message = remote_message(&reply.body).unwrap_or(reply.body);
        Err(PushError::remote(
            "DATASET_DELETE_FAILED",
            format!("{code} - deleting dataset {dataset_id} failed: {message}"),
        )
        .with_status(code))
    }
}
