//! Shared pushload model types: datasets, table schemas, relationships,
//! row batches, and the structured error model.
//!
//! This crate carries no I/O and is safe to depend on from any layer.

pub mod dataset;
pub mod error;
pub mod relationship;
pub mod rows;
pub mod schema;

pub use dataset::{DatasetIdentity, DatasetPayload, DatasetSummary, IdentifyBy, Scope};
pub use error::{ErrorCategory, PushError};
pub use relationship::{CrossFilteringBehavior, Relationship};
pub use rows::RowBatch;
pub use schema::{ColumnDefinition, DataType, TableDefinition};
