//! Rate-limited row ingestion into a confirmed dataset.

use std::time::Duration;

use pushload_types::error::PushError;
use pushload_types::rows::RowBatch;

use crate::client::PushApi;
use crate::errors::LoadError;
use crate::input::InputError;
use crate::rate_window::{Clock, RateWindow};
use crate::result::TableLoadMetric;

/// Streams row batches to one dataset's tables through a [`RateWindow`].
///
/// Batches of a table are sent strictly in the order the source yields
/// them. The first failed batch ends the load.
pub struct RowIngestor<'a, A, C> {
    api: &'a A,
    dataset_id: String,
    window: RateWindow<C>,
    requests: u64,
}

impl<'a, A: PushApi, C: Clock> RowIngestor<'a, A, C> {
    pub fn new(api: &'a A, dataset_id: impl Into<String>, window: RateWindow<C>) -> Self {
        Self {
            api,
            dataset_id: dataset_id.into(),
            window,
            requests: 0,
        }
    }

    /// Delete all rows of every listed table before loading.
    ///
    /// Row deletes do not count against the rate window.
    ///
    /// # Errors
    ///
    /// The first delete failure (`ROWS_DELETE_FAILED`).
    pub async fn purge(&mut self, tables: &[String]) -> Result<(), PushError> {
        for table in tables {
            tracing::info!(dataset_id = %self.dataset_id, table = %table, "Dropping rows in table");
            self.api.delete_rows(&self.dataset_id, table).await?;
        }
        Ok(())
    }

    /// Load every batch from `batches` into `table`.
    ///
    /// # Errors
    ///
    /// A source error, or the first rejected append.
    pub async fn load_table<I>(&mut self, table: &str, batches: I) -> Result<TableLoadMetric, LoadError>
    where
        I: IntoIterator<Item = Result<RowBatch, InputError>>,
    {
        let mut metric = TableLoadMetric {
            table: table.to_string(),
            ..TableLoadMetric::default()
        };
        let mut waited = Duration::ZERO;

        for (index, batch) in batches.into_iter().enumerate() {
            let batch = batch?;
            if batch.is_empty() {
                continue;
            }
            waited += self.window.acquire().await;
            self.api
                .append_rows(&self.dataset_id, table, &batch)
                .await
                .map_err(|e| {
                    tracing::error!(
                        dataset_id = %self.dataset_id,
                        table,
                        batch = index,
                        offset = batch.offset(),
                        code = %e.code,
                        "Append rows failed"
                    );
                    e
                })?;
            self.requests += 1;
            metric.rows += batch.len() as u64;
            metric.batches += 1;
            tracing::debug!(
                table,
                batch = index,
                offset = batch.offset(),
                rows = batch.len(),
                "Batch appended"
            );
        }

        metric.throttle_wait_secs = waited.as_secs_f64();
        tracing::info!(
            dataset_id = %self.dataset_id,
            table,
            rows = metric.rows,
            batches = metric.batches,
            "Table loaded"
        );
        Ok(metric)
    }

    /// Append requests sent so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn window(&self) -> &RateWindow<C> {
        &self.window
    }
}
