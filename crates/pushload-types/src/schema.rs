//! Destination table schema types.
//!
//! A [`TableDefinition`] is the local source of truth for one dataset table.
//! Definitions are built once per run from input manifests and are sent,
//! unchanged, as part of the dataset creation payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column data type in the destination's type vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    String,
    DateTime,
    Int64,
    Decimal,
    Boolean,
}

impl DataType {
    /// Wire name as the destination spells it.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Int64 => "Int64",
            Self::Decimal => "Decimal",
            Self::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Named, ordered column list for one dataset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_serializes_with_camel_case_data_type() {
        let col = ColumnDefinition::new("order_date", DataType::DateTime);
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json, serde_json::json!({"name": "order_date", "dataType": "DateTime"}));
    }

    #[test]
    fn data_type_wire_names_match_display() {
        for dt in [
            DataType::String,
            DataType::DateTime,
            DataType::Int64,
            DataType::Decimal,
            DataType::Boolean,
        ] {
            let json = serde_json::to_value(dt).unwrap();
            assert_eq!(json, serde_json::Value::String(dt.to_string()));
        }
    }

    #[test]
    fn default_data_type_is_string() {
        assert_eq!(DataType::default(), DataType::String);
    }

    #[test]
    fn table_serializes_columns_in_declaration_order() {
        let table = TableDefinition {
            name: "orders".into(),
            columns: vec![
                ColumnDefinition::new("id", DataType::Int64),
                ColumnDefinition::new("amount", DataType::Decimal),
                ColumnDefinition::new("note", DataType::String),
            ],
        };
        let json = serde_json::to_value(&table).unwrap();
        let names: Vec<&str> = json["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["id", "amount", "note"]);
    }
}
