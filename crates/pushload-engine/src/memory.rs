//! In-memory [`PushApi`] used by `run --dry-run` and by tests.
//!
//! Keeps datasets, table names and row counts in process memory, records
//! every call, and can inject failures and read-after-write lag.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use pushload_types::dataset::{DatasetPayload, DatasetSummary};
use pushload_types::error::PushError;
use pushload_types::rows::RowBatch;

use crate::client::PushApi;

/// Operation selector for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListDatasets,
    CreateDataset,
    ListTables,
    AppendRows,
    DeleteRows,
    DeleteDataset,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListDatasets,
    CreateDataset { name: String },
    ListTables { dataset_id: String },
    AppendRows { dataset_id: String, table: String, offset: u64, rows: usize },
    DeleteRows { dataset_id: String, table: String },
    DeleteDataset { dataset_id: String },
}

impl ApiCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::ListDatasets => Operation::ListDatasets,
            Self::CreateDataset { .. } => Operation::CreateDataset,
            Self::ListTables { .. } => Operation::ListTables,
            Self::AppendRows { .. } => Operation::AppendRows,
            Self::DeleteRows { .. } => Operation::DeleteRows,
            Self::DeleteDataset { .. } => Operation::DeleteDataset,
        }
    }
}

#[derive(Debug)]
struct StoredDataset {
    summary: DatasetSummary,
    tables: Vec<String>,
    rows: BTreeMap<String, u64>,
    /// Listing calls that still omit this dataset.
    hidden_for: u32,
}

#[derive(Debug, Default)]
struct State {
    datasets: Vec<StoredDataset>,
    calls: Vec<ApiCall>,
    failures: Vec<(Operation, PushError)>,
    next_ids: VecDeque<String>,
    id_seq: u64,
    visibility_lag: u32,
}

impl State {
    fn take_failure(&mut self, op: Operation) -> Result<(), PushError> {
        match self.failures.iter().position(|(o, _)| *o == op) {
            Some(idx) => Err(self.failures.remove(idx).1),
            None => Ok(()),
        }
    }

    fn dataset_mut(&mut self, dataset_id: &str) -> Option<&mut StoredDataset> {
        self.datasets.iter_mut().find(|d| d.summary.id == dataset_id)
    }
}

fn not_found(code: &str, what: String) -> PushError {
    PushError::remote(code, format!("404 - {what} not found")).with_status(404)
}

/// In-memory destination.
#[derive(Debug, Default)]
pub struct InMemoryPushApi {
    state: Mutex<State>,
}

impl InMemoryPushApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing dataset with the given tables.
    #[must_use]
    pub fn with_dataset(self, id: &str, name: &str, tables: &[&str]) -> Self {
        self.lock().datasets.push(StoredDataset {
            summary: DatasetSummary {
                id: id.to_string(),
                name: name.to_string(),
            },
            tables: tables.iter().map(|t| (*t).to_string()).collect(),
            rows: BTreeMap::new(),
            hidden_for: 0,
        });
        self
    }

    /// Identifier assigned to the next created dataset.
    #[must_use]
    pub fn with_next_id(self, id: &str) -> Self {
        self.lock().next_ids.push_back(id.to_string());
        self
    }

    /// Created datasets stay out of the listing for `polls` list calls.
    #[must_use]
    pub fn with_visibility_lag(self, polls: u32) -> Self {
        self.lock().visibility_lag = polls;
        self
    }

    /// Fail the next call of `op` with `error`.
    pub fn fail_next(&self, op: Operation, error: PushError) {
        self.lock().failures.push((op, error));
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of `op`.
    pub fn count(&self, op: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == op)
            .count()
    }

    pub fn datasets(&self) -> Vec<DatasetSummary> {
        self.lock()
            .datasets
            .iter()
            .map(|d| d.summary.clone())
            .collect()
    }

    /// Rows currently held by `table`, or `None` if it does not exist.
    pub fn row_count(&self, dataset_id: &str, table: &str) -> Option<u64> {
        let state = self.lock();
        let dataset = state.datasets.iter().find(|d| d.summary.id == dataset_id)?;
        if !dataset.tables.iter().any(|t| t == table) {
            return None;
        }
        Some(dataset.rows.get(table).copied().unwrap_or(0))
    }
}

impl PushApi for InMemoryPushApi {
    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>, PushError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::ListDatasets);
        state.take_failure(Operation::ListDatasets)?;
        let mut visible = Vec::new();
        for dataset in &mut state.datasets {
            if dataset.hidden_for > 0 {
                dataset.hidden_for -= 1;
            } else {
                visible.push(dataset.summary.clone());
            }
        }
        Ok(visible)
    }

    async fn create_dataset(&self, payload: &DatasetPayload) -> Result<String, PushError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::CreateDataset {
            name: payload.name.clone(),
        });
        state.take_failure(Operation::CreateDataset)?;
        let id = match state.next_ids.pop_front() {
            Some(id) => id,
            None => {
                state.id_seq += 1;
                format!("ds-{:04}", state.id_seq)
            }
        };
        let hidden_for = state.visibility_lag;
        state.datasets.push(StoredDataset {
            summary: DatasetSummary {
                id: id.clone(),
                name: payload.name.clone(),
            },
            tables: payload.table_names().map(str::to_owned).collect(),
            rows: BTreeMap::new(),
            hidden_for,
        });
        Ok(id)
    }

    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>, PushError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::ListTables {
            dataset_id: dataset_id.to_string(),
        });
        state.take_failure(Operation::ListTables)?;
        state
            .dataset_mut(dataset_id)
            .map(|d| d.tables.clone())
            .ok_or_else(|| not_found("LIST_TABLES_FAILED", format!("dataset {dataset_id}")))
    }

    async fn append_rows(
        &self,
        dataset_id: &str,
        table: &str,
        batch: &RowBatch,
    ) -> Result<(), PushError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::AppendRows {
            dataset_id: dataset_id.to_string(),
            table: table.to_string(),
            offset: batch.offset(),
            rows: batch.len(),
        });
        state.take_failure(Operation::AppendRows)?;
        let dataset = state
            .dataset_mut(dataset_id)
            .ok_or_else(|| not_found("ROWS_REJECTED", format!("dataset {dataset_id}")))?;
        if !dataset.tables.iter().any(|t| t == table) {
            return Err(not_found("ROWS_REJECTED", format!("table {table}")));
        }
        *dataset.rows.entry(table.to_string()).or_default() += batch.len() as u64;
        Ok(())
    }

    async fn delete_rows(&self, dataset_id: &str, table: &str) -> Result<(), PushError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::DeleteRows {
            dataset_id: dataset_id.to_string(),
            table: table.to_string(),
        });
        state.take_failure(Operation::DeleteRows)?;
        let dataset = state
            .dataset_mut(dataset_id)
            .ok_or_else(|| not_found("ROWS_DELETE_FAILED", format!("dataset {dataset_id}")))?;
        if !dataset.tables.iter().any(|t| t == table) {
            return Err(not_found("ROWS_DELETE_FAILED", format!("table {table}")));
        }
        dataset.rows.remove(table);
        Ok(())
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), PushError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::DeleteDataset {
            dataset_id: dataset_id.to_string(),
        });
        state.take_failure(Operation::DeleteDataset)?;
        let before = state.datasets.len();
        state.datasets.retain(|d| d.summary.id != dataset_id);
        if state.datasets.len() == before {
            return Err(not_found(
                "DATASET_DELETE_FAILED",
                format!("dataset {dataset_id}"),
            ));
        }
        Ok(())
    }
}
