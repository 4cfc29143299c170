//! Row batches and their append-rows wire encoding.
//!
//! A [`RowBatch`] is a window of string-typed rows sharing one column list.
//! Values are never coerced here; the destination coerces them against the
//! table definition it already holds.

use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::error::PushError;

/// A window of rows read from one input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch {
    columns: Arc<[String]>,
    rows: Vec<Vec<Option<String>>>,
    offset: u64,
}

impl RowBatch {
    /// Build a batch, checking every row against the column list.
    ///
    /// `offset` is the zero-based index of the first row within its table.
    ///
    /// # Errors
    ///
    /// Returns a `data` error if any row's width differs from `columns`.
    pub fn try_new(
        columns: Arc<[String]>,
        offset: u64,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Self, PushError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(PushError::data(
                "RAGGED_ROW",
                format!(
                    "row {} has {} fields, expected {}",
                    offset + idx as u64,
                    row.len(),
                    columns.len()
                ),
            ));
        }
        Ok(Self {
            columns,
            rows,
            offset,
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrow this batch as the append-rows request body.
    #[must_use]
    pub fn as_request(&self) -> AppendRowsRequest<'_> {
        AppendRowsRequest(self)
    }
}

/// `{"rows": [{column: value, ...}, ...]}` view over a [`RowBatch`].
///
/// Keys keep manifest column order; empty cells serialize as `null`.
pub struct AppendRowsRequest<'a>(&'a RowBatch);

struct Records<'a>(&'a RowBatch);

struct Record<'a> {
    columns: &'a [String],
    values: &'a [Option<String>],
}

impl Serialize for AppendRowsRequest<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("AppendRowsRequest", 1)?;
        body.serialize_field("rows", &Records(self.0))?;
        body.end()
    }
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
        for values in &self.0.rows {
            seq.serialize_element(&Record {
                columns: &self.0.columns,
                values,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
