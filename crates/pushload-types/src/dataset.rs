//! Dataset identity, scope and the wire payloads exchanged with the
//! destination's dataset endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::relationship::Relationship;
use crate::schema::TableDefinition;

/// How a configured dataset is matched against the remote list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifyBy {
    /// Human-readable name; at most one match may exist in scope.
    #[serde(alias = "Name")]
    Name,
    /// Opaque remote identifier; exactly one match must exist.
    #[serde(alias = "ID", alias = "Id")]
    Id,
}

impl fmt::Display for IdentifyBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Id => f.write_str("id"),
        }
    }
}

/// The logical destination a job writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetIdentity {
    pub identify_by: IdentifyBy,
    pub value: String,
}

impl DatasetIdentity {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            identify_by: IdentifyBy::Name,
            value: name.into(),
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            identify_by: IdentifyBy::Id,
            value: id.into(),
        }
    }

    /// Whether `summary` is the dataset this identity points at.
    #[must_use]
    pub fn matches(&self, summary: &DatasetSummary) -> bool {
        match self.identify_by {
            IdentifyBy::Name => summary.name == self.value,
            IdentifyBy::Id => summary.id == self.value,
        }
    }
}

impl fmt::Display for DatasetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.identify_by, self.value)
    }
}

/// Workspace scope that prefixes every dataset path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    workspace: Option<String>,
}

impl Scope {
    /// Build a scope; an empty or blank workspace means the personal scope.
    pub fn new(workspace: Option<&str>) -> Self {
        let workspace = workspace
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_owned);
        Self { workspace }
    }

    /// Workspace id; `None` for the personal scope.
    #[must_use]
    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }
}

/// One entry of the remote dataset listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
    pub name: String,
}

/// Body of the list-datasets response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetList {
    #[serde(default)]
    pub value: Vec<DatasetSummary>,
}

/// One entry of the remote table listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableSummary {
    pub name: String,
}

/// Body of the list-tables response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableList {
    #[serde(default)]
    pub value: Vec<TableSummary>,
}

/// Storage mode requested at creation. Only push datasets are created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultMode {
    #[default]
    Push,
}

/// Dataset creation request: every table and relationship in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetPayload {
    pub name: String,
    pub default_mode: DefaultMode,
    pub tables: Vec<TableDefinition>,
    pub relationships: Vec<Relationship>,
}

impl DatasetPayload {
    pub fn push(
        name: impl Into<String>,
        tables: Vec<TableDefinition>,
        relationships: Vec<Relationship>,
    ) -> Self {
        Self {
            name: name.into(),
            default_mode: DefaultMode::Push,
            tables,
            relationships,
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}

/// Body of a successful create-dataset response.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedDataset {
    pub id: String,
}
