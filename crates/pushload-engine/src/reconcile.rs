//! Dataset reconciliation: find the configured dataset, create it when it is
//! absent, and wait until the creation is visible in listings.
//!
//! State machine:
//!
//! ```text
//! Unresolved -> Found(id) | NotFound -> Created(id) -> Visible(id)
//! ```
//!
//! Duplicate names, unknown identifiers, rejected creation and visibility
//! timeouts are terminal and returned as [`PushError`]s. Nothing here
//! retries them.

use std::collections::HashSet;
use std::time::Duration;

use pushload_types::dataset::{DatasetIdentity, DatasetPayload, DatasetSummary, IdentifyBy};
use pushload_types::error::PushError;

use crate::client::PushApi;
use crate::config::types::{LoadLimits, SchemaMismatchPolicy};
use crate::rate_window::Clock;

/// Outcome of matching the configured identity against a dataset listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { dataset_id: String },
    NotFound,
}

impl Resolution {
    pub fn dataset_id(&self) -> Option<&str> {
        match self {
            Self::Found { dataset_id } => Some(dataset_id),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileState {
    Unresolved,
    Found { dataset_id: String },
    NotFound,
    Created { dataset_id: String },
    Visible { dataset_id: String },
}

/// Match `identity` against `datasets`.
///
/// By name the first match wins and a second match is a duplicate error.
/// By identifier an exact match is required.
///
/// # Errors
///
/// `config` errors `DUPLICATE_DATASET_NAME` and `DATASET_ID_NOT_FOUND`.
pub fn match_dataset(
    identity: &DatasetIdentity,
    datasets: &[DatasetSummary],
) -> Result<Resolution, PushError> {
    let mut matches = datasets.iter().filter(|d| identity.matches(d));
    let first = matches.next();

    match identity.identify_by {
        IdentifyBy::Name => {
            if let Some(second) = matches.next() {
                return Err(PushError::config(
                    "DUPLICATE_DATASET_NAME",
                    format!(
                        "Duplicated dataset name '{}' found. Please enter a different dataset name or specify the dataset ID.",
                        identity.value
                    ),
                )
                .with_details(serde_json::json!({
                    "dataset_ids": [first.map(|d| d.id.as_str()), Some(second.id.as_str())],
                })));
            }
        }
        IdentifyBy::Id => {
            if first.is_none() {
                return Err(PushError::config(
                    "DATASET_ID_NOT_FOUND",
                    format!(
                        "Input dataset ID '{}' is not found. Please verify input value.",
                        identity.value
                    ),
                ));
            }
        }
    }

    Ok(first.map_or(Resolution::NotFound, |d| Resolution::Found {
        dataset_id: d.id.clone(),
    }))
}

/// Polling bound for [`DatasetReconciler::await_visible`].
#[derive(Debug, Clone, Copy)]
pub struct VisibilityPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl VisibilityPolicy {
    pub fn from_limits(limits: &LoadLimits) -> Self {
        Self {
            poll_interval: limits.visibility_poll_interval(),
            max_polls: limits.visibility_max_polls.max(1),
        }
    }
}

/// Options for [`DatasetReconciler::ensure`].
#[derive(Debug, Clone, Copy)]
pub struct EnsureOptions {
    pub visibility: VisibilityPolicy,
    pub on_mismatch: SchemaMismatchPolicy,
}

/// Confirmed remote dataset for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    pub dataset_id: String,
    /// Created (or recreated) during this run.
    pub created: bool,
    /// Table names from the local definitions.
    pub tables: Vec<String>,
    /// Local tables the existing dataset lacks (kept under `ignore`).
    pub missing_tables: Vec<String>,
}

impl DatasetHandle {
    /// Local tables known to exist remotely.
    pub fn existing_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| !self.missing_tables.contains(t))
            .cloned()
            .collect()
    }
}

/// Local tables missing from a non-empty remote listing.
pub fn missing_tables(local: &[String], remote: &[String]) -> Vec<String> {
    if remote.is_empty() {
        return Vec::new();
    }
    let remote: HashSet<&str> = remote.iter().map(String::as_str).collect();
    local
        .iter()
        .filter(|t| !remote.contains(t.as_str()))
        .cloned()
        .collect()
}

pub struct DatasetReconciler<'a, A, C> {
    api: &'a A,
    clock: &'a C,
    identity: &'a DatasetIdentity,
    state: ReconcileState,
}

impl<'a, A: PushApi, C: Clock> DatasetReconciler<'a, A, C> {
    pub fn new(api: &'a A, clock: &'a C, identity: &'a DatasetIdentity) -> Self {
        Self {
            api,
            clock,
            identity,
            state: ReconcileState::Unresolved,
        }
    }

    pub fn state(&self) -> &ReconcileState {
        &self.state
    }

    /// List datasets in scope and match the configured identity.
    /// Read-only; safe to call again.
    ///
    /// # Errors
    ///
    /// Listing failures and [`match_dataset`] errors.
    pub async fn resolve(&mut self) -> Result<Resolution, PushError> {
        let datasets = self.api.list_datasets().await?;
        let resolution = match_dataset(self.identity, &datasets)?;
        match &resolution {
            Resolution::Found { dataset_id } => {
                tracing::info!(dataset = %self.identity, dataset_id = %dataset_id, "Matching dataset found");
                self.state = ReconcileState::Found {
                    dataset_id: dataset_id.clone(),
                };
            }
            Resolution::NotFound => {
                tracing::info!(dataset = %self.identity, "Dataset not found");
                self.state = ReconcileState::NotFound;
            }
        }
        Ok(resolution)
    }

    /// Submit the whole payload as one creation request.
    ///
    /// # Errors
    ///
    /// Any rejection is terminal (`DATASET_CREATE_REJECTED`).
    pub async fn create(&mut self, payload: &DatasetPayload) -> Result<String, PushError> {
        let dataset_id = self.api.create_dataset(payload).await?;
        tracing::info!(
            dataset_id = %dataset_id,
            tables = payload.tables.len(),
            relationships = payload.relationships.len(),
            "Dataset created"
        );
        self.state = ReconcileState::Created {
            dataset_id: dataset_id.clone(),
        };
        Ok(dataset_id)
    }

    /// Poll the listing until the created dataset shows up.
    ///
    /// # Errors
    ///
    /// `internal` if nothing was created, `timeout` `RECONCILIATION_TIMEOUT`
    /// after `max_polls` listings, or a listing failure.
    pub async fn await_visible(&mut self, policy: VisibilityPolicy) -> Result<(), PushError> {
        let dataset_id = match &self.state {
            ReconcileState::Created { dataset_id } => dataset_id.clone(),
            ReconcileState::Visible { .. } => return Ok(()),
            other => {
                return Err(PushError::internal(
                    "INVALID_RECONCILE_STATE",
                    format!("await_visible called in state {other:?}"),
                ))
            }
        };

        for poll in 1..=policy.max_polls {
            let datasets = self.api.list_datasets().await?;
            if datasets.iter().any(|d| d.id == dataset_id) {
                tracing::info!(dataset_id = %dataset_id, polls = poll, "Dataset visible");
                self.state = ReconcileState::Visible { dataset_id };
                return Ok(());
            }
            if poll < policy.max_polls {
                tracing::debug!(dataset_id = %dataset_id, poll, "Dataset not visible yet");
                self.clock.sleep(policy.poll_interval).await;
            }
        }

        Err(PushError::timeout(
            "RECONCILIATION_TIMEOUT",
            format!(
                "dataset {dataset_id} not visible after {} polls",
                policy.max_polls
            ),
        ))
    }

    /// Remote table names; empty on failure.
    pub async fn remote_tables(&self, dataset_id: &str) -> Vec<String> {
        match self.api.list_tables(dataset_id).await {
            Ok(tables) => tables,
            Err(e) => {
                tracing::warn!(dataset_id, code = %e.code, error = %e, "Table listing failed, continuing");
                Vec::new()
            }
        }
    }

    /// Delete a dataset. Failures are logged; returns whether it was deleted.
    pub async fn delete_dataset(&mut self, dataset_id: &str) -> bool {
        tracing::info!(dataset_id, "Dropping dataset");
        match self.api.delete_dataset(dataset_id).await {
            Ok(()) => {
                if self.state.dataset_id() == Some(dataset_id) {
                    self.state = ReconcileState::NotFound;
                }
                true
            }
            Err(e) => {
                tracing::error!(dataset_id, code = %e.code, error = %e, "Dataset delete failed");
                false
            }
        }
    }

    async fn create_visible(
        &mut self,
        payload: &DatasetPayload,
        visibility: VisibilityPolicy,
    ) -> Result<String, PushError> {
        let dataset_id = self.create(payload).await?;
        self.await_visible(visibility).await?;
        Ok(dataset_id)
    }

    /// Resolve, create if absent, and check an existing dataset's tables
    /// against the payload.
    ///
    /// # Errors
    ///
    /// Terminal reconciliation errors, or `schema` `SCHEMA_MISMATCH` when
    /// the mismatch policy rejects the existing dataset.
    pub async fn ensure(
        &mut self,
        payload: &DatasetPayload,
        options: EnsureOptions,
    ) -> Result<DatasetHandle, PushError> {
        let local: Vec<String> = payload.table_names().map(str::to_owned).collect();

        let dataset_id = match self.resolve().await? {
            Resolution::NotFound => {
                let dataset_id = self.create_visible(payload, options.visibility).await?;
                return Ok(DatasetHandle {
                    dataset_id,
                    created: true,
                    tables: local,
                    missing_tables: Vec::new(),
                });
            }
            Resolution::Found { dataset_id } => dataset_id,
        };

        let remote = self.remote_tables(&dataset_id).await;
        let missing = missing_tables(&local, &remote);
        if missing.is_empty() {
            return Ok(DatasetHandle {
                dataset_id,
                created: false,
                tables: local,
                missing_tables: Vec::new(),
            });
        }

        let mismatch = || {
            PushError::schema(
                "SCHEMA_MISMATCH",
                format!(
                    "dataset {dataset_id} is missing table(s): {}",
                    missing.join(", ")
                ),
            )
            .with_details(serde_json::json!({
                "dataset_id": dataset_id,
                "missing": missing,
                "remote": remote,
            }))
        };

        match options.on_mismatch {
            SchemaMismatchPolicy::Ignore => {
                tracing::warn!(
                    dataset_id = %dataset_id,
                    missing = %missing.join(", "),
                    "Existing dataset lacks local tables, loading anyway"
                );
                Ok(DatasetHandle {
                    dataset_id,
                    created: false,
                    tables: local,
                    missing_tables: missing,
                })
            }
            SchemaMismatchPolicy::Fail => Err(mismatch()),
            SchemaMismatchPolicy::Recreate => {
                if self.identity.identify_by == IdentifyBy::Id {
                    return Err(mismatch());
                }
                tracing::warn!(
                    dataset_id = %dataset_id,
                    missing = %missing.join(", "),
                    "Existing dataset lacks local tables, recreating"
                );
                if !self.delete_dataset(&dataset_id).await {
                    return Err(mismatch());
                }
                let dataset_id = self.create_visible(payload, options.visibility).await?;
                Ok(DatasetHandle {
                    dataset_id,
                    created: true,
                    tables: local,
                    missing_tables: Vec::new(),
                })
            }
        }
    }
}

impl ReconcileState {
    pub fn dataset_id(&self) -> Option<&str> {
        match self {
            Self::Found { dataset_id }
            | Self::Created { dataset_id }
            | Self::Visible { dataset_id } => Some(dataset_id),
            Self::Unresolved | Self::NotFound => None,
        }
    }
}
