//! Configured foreign-key links to dataset relationships.

use pushload_types::relationship::{CrossFilteringBehavior, Relationship};

use crate::config::types::RelationshipLink;

/// Build one relationship per link, foreign key side first.
///
/// Table and column references are not checked here; the destination rejects
/// an invalid reference when the dataset is created.
pub fn build_relationships(links: &[RelationshipLink]) -> Vec<Relationship> {
    links
        .iter()
        .map(|link| Relationship {
            name: format!("{} - {}", link.foreign_key_table, link.primary_key_table),
            from_table: link.foreign_key_table.clone(),
            from_column: link.foreign_key_column_name.clone(),
            to_table: link.primary_key_table.clone(),
            to_column: link.primary_key_column_name.clone(),
            cross_filtering_behavior: CrossFilteringBehavior::Automatic,
        })
        .collect()
}
