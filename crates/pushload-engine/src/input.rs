//! Input tables: manifest loading and lazy CSV batch reading.
//!
//! Every configured table reference `R` resolves to a CSV file `R` and a JSON
//! manifest `R.manifest` under the tables directory. The manifest declares
//! the column order and per-column metadata tags.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pushload_types::error::PushError;
use pushload_types::rows::RowBatch;
use serde::Deserialize;

/// Errors raised while reading input manifests and CSV files.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {path} declares no columns")]
    NoColumns { path: PathBuf },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("invalid batch from {path}: {source}")]
    Batch {
        path: PathBuf,
        #[source]
        source: PushError,
    },
}

/// One `{key, value}` metadata tag attached to a column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetadataTag {
    pub key: String,
    pub value: String,
}

/// Sidecar manifest describing one input table.
#[derive(Debug, Clone, Deserialize)]
pub struct TableManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub column_metadata: HashMap<String, Vec<MetadataTag>>,
}

impl TableManifest {
    /// Metadata tags for `column`; empty when the manifest has none.
    pub fn tags(&self, column: &str) -> &[MetadataTag] {
        self.column_metadata
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A resolved input table: its destination name, manifest and CSV path.
#[derive(Debug, Clone)]
pub struct InputTable {
    pub table_name: String,
    pub manifest: TableManifest,
    pub csv_path: PathBuf,
}

impl InputTable {
    /// Load the manifest for table reference `reference` under `tables_dir`.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] if the manifest is missing, unparsable, or
    /// declares no columns.
    pub fn load(tables_dir: &Path, reference: &str) -> Result<Self, InputError> {
        let csv_path = tables_dir.join(reference);
        let manifest_path = tables_dir.join(format!("{reference}.manifest"));

        let file = File::open(&manifest_path).map_err(|source| InputError::Io {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: TableManifest = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| InputError::Manifest {
                path: manifest_path.clone(),
                source,
            })?;
        if manifest.columns.is_empty() {
            return Err(InputError::NoColumns {
                path: manifest_path,
            });
        }

        let table_name = manifest
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                reference
                    .strip_suffix(".csv")
                    .unwrap_or(reference)
                    .to_string()
            });

        Ok(Self {
            table_name,
            manifest,
            csv_path,
        })
    }

    /// Open a fresh batch reader over this table's CSV file.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] if the CSV file cannot be opened.
    pub fn batches(&self, batch_size: usize) -> Result<CsvBatchReader, InputError> {
        CsvBatchReader::open(&self.csv_path, &self.manifest.columns, batch_size)
    }
}

/// Load every configured input table, in configuration order.
///
/// # Errors
///
/// Returns the first [`InputError`] encountered.
pub fn load_input_tables(
    tables_dir: &Path,
    references: &[String],
) -> Result<Vec<InputTable>, InputError> {
    references
        .iter()
        .map(|reference| InputTable::load(tables_dir, reference))
        .collect()
}

/// Lazy, in-order sequence of [`RowBatch`]es read from one CSV file.
///
/// The header line is skipped; rows are keyed by the manifest column order.
/// Re-open the file to restart the sequence.
pub struct CsvBatchReader {
    path: PathBuf,
    reader: csv::Reader<BufReader<File>>,
    columns: Arc<[String]>,
    batch_size: usize,
    next_offset: u64,
    record: csv::StringRecord,
    done: bool,
}

impl CsvBatchReader {
    /// # Errors
    ///
    /// Returns an [`InputError::Io`] if the file cannot be opened.
    pub fn open(path: &Path, columns: &[String], batch_size: usize) -> Result<Self, InputError> {
        let file = File::open(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns: columns.iter().cloned().collect(),
            batch_size: batch_size.max(1),
            next_offset: 0,
            record: csv::StringRecord::new(),
            done: false,
        })
    }

    fn read_batch(&mut self) -> Result<Option<RowBatch>, InputError> {
        let offset = self.next_offset;
        let mut rows = Vec::with_capacity(self.batch_size.min(1024));

        while rows.len() < self.batch_size {
            let more = self
                .reader
                .read_record(&mut self.record)
                .map_err(|source| InputError::Csv {
                    path: self.path.clone(),
                    source,
                })?;
            if !more {
                self.done = true;
                break;
            }
            if self.record.len() != self.columns.len() {
                return Err(InputError::RaggedRow {
                    path: self.path.clone(),
                    line: self.record.position().map_or(0, csv::Position::line),
                    expected: self.columns.len(),
                    found: self.record.len(),
                });
            }
            rows.push(
                self.record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        if rows.is_empty() {
            return Ok(None);
        }
        self.next_offset += rows.len() as u64;
        RowBatch::try_new(Arc::clone(&self.columns), offset, rows)
            .map(Some)
            .map_err(|source| InputError::Batch {
                path: self.path.clone(),
                source,
            })
    }
}

impl Iterator for CsvBatchReader {
    type Item = Result<RowBatch, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
