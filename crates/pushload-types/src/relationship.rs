//! Cross-table relationship descriptors sent at dataset creation.

use serde::{Deserialize, Serialize};

/// Filter propagation direction across a relationship.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossFilteringBehavior {
    OneDirection,
    BothDirections,
    /// Let the destination pick the direction (bidirectional propagation).
    #[default]
    Automatic,
}

/// Directed edge `(from_table, from_column) -> (to_table, to_column)`.
///
/// The "from" side is the foreign key, the "to" side the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub name: String,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub cross_filtering_behavior: CrossFilteringBehavior,
}
