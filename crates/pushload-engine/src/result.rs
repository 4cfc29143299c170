//! Load run result types.

use serde::Serialize;

/// Per-table ingestion counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableLoadMetric {
    pub table: String,
    pub rows: u64,
    pub batches: u64,
    pub throttle_wait_secs: f64,
}

/// Result of a completed load run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub job: String,
    pub dataset_id: String,
    /// The dataset did not exist (or was recreated) during this run.
    pub created: bool,
    /// Rows of existing tables were deleted before loading.
    pub purged: bool,
    pub tables: Vec<TableLoadMetric>,
    pub append_requests: u64,
    pub throttled: u32,
    pub throttle_wait_secs: f64,
    pub duration_secs: f64,
}

impl LoadSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Result of a read-only job check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub job: String,
    pub dataset: String,
    pub found: bool,
    pub dataset_id: Option<String>,
    pub local_tables: Vec<String>,
    pub remote_tables: Vec<String>,
    /// Local tables absent from a non-empty remote listing.
    pub missing_tables: Vec<String>,
}

/// Outcome of a drop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DropOutcome {
    Deleted { dataset_id: String },
    NotFound,
    /// The destination refused the delete; the failure was logged.
    Failed { dataset_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_rows_sums_tables() {
        let summary = LoadSummary {
            job: "j".into(),
            dataset_id: "abc".into(),
            created: true,
            purged: false,
            tables: vec![
                TableLoadMetric {
                    table: "orders".into(),
                    rows: 2500,
                    batches: 1,
                    throttle_wait_secs: 0.0,
                },
                TableLoadMetric {
                    table: "customers".into(),
                    rows: 50,
                    batches: 1,
                    throttle_wait_secs: 0.0,
                },
            ],
            append_requests: 2,
            throttled: 0,
            throttle_wait_secs: 0.0,
            duration_secs: 0.1,
        };
        assert_eq!(summary.total_rows(), 2550);
    }

    #[test]
    fn drop_outcome_serializes_tagged() {
        let json = serde_json::to_value(DropOutcome::Deleted {
            dataset_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "deleted", "dataset_id": "abc"}));
        let json = serde_json::to_value(DropOutcome::NotFound).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "not_found"}));
    }
}
