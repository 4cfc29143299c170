//! Upstream base-type tags to destination table definitions.

use pushload_types::dataset::DatasetPayload;
use pushload_types::schema::{ColumnDefinition, DataType, TableDefinition};

use crate::config::types::RelationshipLink;
use crate::input::{InputTable, TableManifest};
use crate::relationships::build_relationships;

/// Metadata key carrying a column's upstream base type.
pub const BASE_TYPE_KEY: &str = "KBC.datatype.basetype";

/// Map an upstream base-type tag to a destination data type.
///
/// Unknown and absent tags both map to `String`.
pub fn data_type_for(base_type: Option<&str>) -> DataType {
    match base_type {
        Some("STRING") => DataType::String,
        Some("DATE" | "TIMESTAMP") => DataType::DateTime,
        Some("INTEGER") => DataType::Int64,
        Some("FLOAT" | "NUMERIC") => DataType::Decimal,
        Some("BOOLEAN") => DataType::Boolean,
        _ => DataType::String,
    }
}

fn column_definition(manifest: &TableManifest, column: &str) -> ColumnDefinition {
    let base_type = manifest
        .tags(column)
        .iter()
        .find(|tag| tag.key == BASE_TYPE_KEY)
        .map(|tag| tag.value.as_str());
    ColumnDefinition::new(column, data_type_for(base_type))
}

/// Table definition for one input table, columns in manifest order.
pub fn table_definition(table_name: &str, manifest: &TableManifest) -> TableDefinition {
    TableDefinition {
        name: table_name.to_string(),
        columns: manifest
            .columns
            .iter()
            .map(|column| column_definition(manifest, column))
            .collect(),
    }
}

pub fn build_table_definitions(inputs: &[InputTable]) -> Vec<TableDefinition> {
    inputs
        .iter()
        .map(|input| table_definition(&input.table_name, &input.manifest))
        .collect()
}

/// Full push-dataset creation payload for `dataset_name`.
pub fn build_payload(
    dataset_name: &str,
    inputs: &[InputTable],
    links: &[RelationshipLink],
) -> DatasetPayload {
    DatasetPayload::push(
        dataset_name,
        build_table_definitions(inputs),
        build_relationships(links),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("STRING"), DataType::String)]
    #[case(Some("DATE"), DataType::DateTime)]
    #[case(Some("TIMESTAMP"), DataType::DateTime)]
    #[case(Some("INTEGER"), DataType::Int64)]
    #[case(Some("FLOAT"), DataType::Decimal)]
    #[case(Some("NUMERIC"), DataType::Decimal)]
    #[case(Some("BOOLEAN"), DataType::Boolean)]
    #[case(None, DataType::String)]
    #[case(Some("GEOGRAPHY"), DataType::String)]
    #[case(Some("integer"), DataType::String)]
    #[case(Some(""), DataType::String)]
    fn base_type_mapping(#[case] tag: Option<&str>, #[case] expected: DataType) {
        assert_eq!(data_type_for(tag), expected);
    }

    fn manifest(json: &str) -> TableManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn columns_follow_manifest_order_and_tags() {
        let m = manifest(
            r#"{
                "name": "orders",
                "columns": ["id", "placed_at", "amount", "note"],
                "column_metadata": {
                    "note": [{"key": "KBC.description", "value": "free text"}],
                    "amount": [{"key": "KBC.datatype.basetype", "value": "NUMERIC"}],
                    "id": [
                        {"key": "KBC.datatype.nullable", "value": "0"},
                        {"key": "KBC.datatype.basetype", "value": "INTEGER"}
                    ],
                    "placed_at": [{"key": "KBC.datatype.basetype", "value": "TIMESTAMP"}]
                }
            }"#,
        );
        let def = table_definition("orders", &m);
        assert_eq!(def.name, "orders");
        assert_eq!(
            def.columns,
            vec![
                ColumnDefinition::new("id", DataType::Int64),
                ColumnDefinition::new("placed_at", DataType::DateTime),
                ColumnDefinition::new("amount", DataType::Decimal),
                ColumnDefinition::new("note", DataType::String),
            ]
        );
    }

    #[test]
    fn column_without_metadata_is_string() {
        let m = manifest(r#"{"columns": ["a"]}"#);
        let def = table_definition("t", &m);
        assert_eq!(def.columns[0].data_type, DataType::String);
    }

    #[test]
    fn mapping_is_deterministic() {
        let m = manifest(
            r#"{"columns": ["a"], "column_metadata": {"a": [{"key": "KBC.datatype.basetype", "value": "BOOLEAN"}]}}"#,
        );
        assert_eq!(table_definition("t", &m), table_definition("t", &m));
    }
}
