//! Load orchestration: plan, reconcile, purge, then ingest table by table.

use std::time::Instant;

use pushload_types::dataset::{DatasetPayload, IdentifyBy};

use crate::client::PushApi;
use crate::config::types::JobConfig;
use crate::config::validator::validate_job;
use crate::errors::LoadError;
use crate::input::{load_input_tables, InputTable};
use crate::ingest::RowIngestor;
use crate::memory::InMemoryPushApi;
use crate::rate_window::{Clock, RateWindow, SystemClock};
use crate::reconcile::{
    missing_tables, DatasetReconciler, EnsureOptions, Resolution, VisibilityPolicy,
};
use crate::result::{CheckReport, DropOutcome, LoadSummary};
use crate::schema_map::build_payload;

/// Input tables and the creation payload derived from them.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub inputs: Vec<InputTable>,
    pub payload: DatasetPayload,
}

impl LoadPlan {
    pub fn table_names(&self) -> Vec<String> {
        self.inputs.iter().map(|i| i.table_name.clone()).collect()
    }
}

/// Read every manifest and build the dataset creation payload.
///
/// # Errors
///
/// Returns `LoadError::Infrastructure` if a manifest cannot be read.
pub fn plan_load(job: &JobConfig) -> Result<LoadPlan, LoadError> {
    let inputs = load_input_tables(&job.input.tables_dir, &job.input.tables)?;
    let payload = build_payload(&job.dataset.value, &inputs, &job.relationships);
    tracing::debug!(
        tables = payload.tables.len(),
        relationships = payload.relationships.len(),
        "Dataset payload built"
    );
    Ok(LoadPlan { inputs, payload })
}

/// In-memory destination for a dry run of `job`.
///
/// A dataset identified by id must already exist, so it is seeded with the
/// planned tables. A dataset identified by name starts absent and is created.
pub fn dry_run_destination(job: &JobConfig, plan: &LoadPlan) -> InMemoryPushApi {
    let api = InMemoryPushApi::new();
    match job.dataset.identify_by {
        IdentifyBy::Id => {
            let tables = plan.table_names();
            let tables: Vec<&str> = tables.iter().map(String::as_str).collect();
            api.with_dataset(&job.dataset.value, &job.job, &tables)
        }
        IdentifyBy::Name => api,
    }
}

/// Run a full load: reconcile the dataset, purge when incremental, then
/// stream every input table in configuration order.
///
/// # Errors
///
/// Returns the first failure; nothing further is attempted after it.
pub async fn run_load<A: PushApi, C: Clock + Clone>(
    job: &JobConfig,
    plan: &LoadPlan,
    api: &A,
    clock: C,
) -> Result<LoadSummary, LoadError> {
    let start = Instant::now();
    tracing::info!(
        job = %job.job,
        dataset = %job.dataset,
        incremental = job.incremental,
        tables = plan.inputs.len(),
        "Starting load run"
    );

    let handle = {
        let mut reconciler = DatasetReconciler::new(api, &clock, &job.dataset);
        reconciler
            .ensure(
                &plan.payload,
                EnsureOptions {
                    visibility: VisibilityPolicy::from_limits(&job.limits),
                    on_mismatch: job.on_schema_mismatch,
                },
            )
            .await?
    };

    let window = RateWindow::new(
        clock.clone(),
        job.limits.requests_per_window,
        job.limits.window(),
    );
    let mut ingestor = RowIngestor::new(api, handle.dataset_id.clone(), window);

    let purged = job.incremental && !handle.created;
    if purged {
        ingestor.purge(&handle.existing_tables()).await?;
    }

    let mut tables = Vec::with_capacity(plan.inputs.len());
    for input in &plan.inputs {
        tracing::info!(table = %input.table_name, "Loading table");
        let batches = input.batches(job.limits.batch_size)?;
        tables.push(ingestor.load_table(&input.table_name, batches).await?);
    }

    let summary = LoadSummary {
        job: job.job.clone(),
        dataset_id: handle.dataset_id,
        created: handle.created,
        purged,
        tables,
        append_requests: ingestor.requests(),
        throttled: ingestor.window().throttled(),
        throttle_wait_secs: ingestor.window().total_wait().as_secs_f64(),
        duration_secs: start.elapsed().as_secs_f64(),
    };
    tracing::info!(
        dataset_id = %summary.dataset_id,
        rows = summary.total_rows(),
        append_requests = summary.append_requests,
        throttled = summary.throttled,
        duration_secs = summary.duration_secs,
        "Load finished"
    );
    Ok(summary)
}

/// Validate the job, read every manifest and resolve the dataset without
/// writing anything.
///
/// # Errors
///
/// Validation, manifest and resolution failures.
pub async fn check_job<A: PushApi>(job: &JobConfig, api: &A) -> Result<CheckReport, LoadError> {
    validate_job(job)?;
    let plan = plan_load(job)?;
    let local = plan.table_names();

    let clock = SystemClock;
    let mut reconciler = DatasetReconciler::new(api, &clock, &job.dataset);
    let resolution = reconciler.resolve().await?;
    let remote = match resolution.dataset_id() {
        Some(id) => reconciler.remote_tables(id).await,
        None => Vec::new(),
    };

    Ok(CheckReport {
        job: job.job.clone(),
        dataset: job.dataset.to_string(),
        found: resolution.is_found(),
        dataset_id: resolution.dataset_id().map(str::to_owned),
        missing_tables: missing_tables(&local, &remote),
        local_tables: local,
        remote_tables: remote,
    })
}

/// Resolve the configured dataset and delete it.
///
/// A refused delete is logged and reported as [`DropOutcome::Failed`].
///
/// # Errors
///
/// Resolution failures only.
pub async fn drop_dataset<A: PushApi>(job: &JobConfig, api: &A) -> Result<DropOutcome, LoadError> {
    let clock = SystemClock;
    let mut reconciler = DatasetReconciler::new(api, &clock, &job.dataset);
    match reconciler.resolve().await? {
        Resolution::NotFound => {
            tracing::info!(dataset = %job.dataset, "Nothing to drop");
            Ok(DropOutcome::NotFound)
        }
        Resolution::Found { dataset_id } => {
            if reconciler.delete_dataset(&dataset_id).await {
                Ok(DropOutcome::Deleted { dataset_id })
            } else {
                Ok(DropOutcome::Failed { dataset_id })
            }
        }
    }
}
