//! Push-dataset load engine: job config, credentials, input tables, schema
//! mapping, dataset reconciliation and rate-limited row ingestion.

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod input;
pub mod memory;
pub mod orchestrator;
pub mod rate_window;
pub mod reconcile;
pub mod relationships;
pub mod result;
pub mod schema_map;

// Re-export public API for convenience
pub use client::{HttpPushClient, PushApi, RetryPolicy};
pub use errors::LoadError;
pub use orchestrator::{
    check_job, drop_dataset, dry_run_destination, plan_load, run_load, LoadPlan,
};
pub use rate_window::{Clock, ManualClock, RateWindow, SystemClock};
pub use result::{CheckReport, DropOutcome, LoadSummary, TableLoadMetric};
