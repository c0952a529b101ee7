use serde_json::Value;
use tracing::debug;

use super::cast::ColumnBuilder;
use crate::error::{BqLiteError, Result};
use crate::frame::{Column, RawRowPage, TypedTable};
use crate::schema::{ColumnSchema, Field};

pub struct ResultMaterializer;

impl ResultMaterializer {
    /// Casts a column-major result page into a typed table.
    ///
    /// Columns are moved out of `rows` one at a time in schema order. A
    /// REPEATED column expands into `{name}_{i}` columns, one per position up
    /// to the longest nested value in the page; a page where every nested
    /// value is empty contributes no columns for that field. A page with no
    /// rows gives an empty table whatever the schema says.
    pub fn materialize(rows: RawRowPage, schema: &ColumnSchema) -> Result<TypedTable> {
        if rows.is_empty() {
            return Ok(TypedTable::empty());
        }

        if rows.column_count() != schema.len() {
            return Err(BqLiteError::MalformedInput(format!(
                "result has {} columns but schema has {}",
                rows.column_count(),
                schema.len()
            )));
        }

        let row_count = rows.row_count();
        let mut table = TypedTable::empty();

        for (field, values) in schema.fields().iter().zip(rows.into_columns()) {
            if values.len() != row_count {
                return Err(BqLiteError::MalformedInput(format!(
                    "column '{}' has {} values, expected {}",
                    field.name,
                    values.len(),
                    row_count
                )));
            }

            if field.mode.is_repeated() {
                for column in Self::expand_repeated(field, values)? {
                    table.push_column(column)?;
                }
            } else {
                table.push_column(Self::cast_column(field, values)?)?;
            }
        }

        debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            "Materialized result page"
        );

        Ok(table)
    }

    fn cast_column(field: &Field, values: Vec<Value>) -> Result<Column> {
        let mut builder = ColumnBuilder::new(field.name.clone(), field.logical_type, values.len());
        for value in values {
            builder.push(value)?;
        }
        Ok(builder.finish())
    }

    fn expand_repeated(field: &Field, values: Vec<Value>) -> Result<Vec<Column>> {
        let mut nested: Vec<Vec<Value>> = values
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Value::Array(items) => Ok(items),
                other => Err(BqLiteError::MalformedInput(format!(
                    "repeated column '{}' row {}: expected a sequence, got {}",
                    field.name, row, other
                ))),
            })
            .collect::<Result<_>>()?;

        let max_len = nested.iter().map(Vec::len).max().unwrap_or(0);
        let mut columns = Vec::with_capacity(max_len);

        for position in 0..max_len {
            let mut builder = ColumnBuilder::new(
                format!("{}_{}", field.name, position),
                field.logical_type,
                nested.len(),
            );
            for items in nested.iter_mut() {
                match items.get_mut(position) {
                    Some(item) => builder.push(std::mem::take(item))?,
                    None => builder.push_null(),
                }
            }
            columns.push(builder.finish());
        }

        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ColumnData, StorageKind};
    use crate::schema::{FieldMode, LogicalType, SchemaInferrer};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn page(columns: Vec<Vec<Value>>) -> RawRowPage {
        RawRowPage::new(columns)
    }

    #[test]
    fn test_integer_and_boolean_scenario() {
        let schema = ColumnSchema::new(vec![
            Field::new("a", LogicalType::Integer),
            Field::new("b", LogicalType::Boolean),
        ]);
        let rows = page(vec![
            vec![json!(1), Value::Null, json!(3)],
            vec![json!("true"), json!("false"), Value::Null],
        ]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(
            table.column("a"),
            Some(&ColumnData::Float64(vec![Some(1.0), None, Some(3.0)]))
        );
        assert_eq!(
            table.column("b"),
            Some(&ColumnData::Boolean(vec![Some(true), Some(false), None]))
        );
    }

    #[test]
    fn test_nulls_stay_null_for_every_type() {
        for ty in LogicalType::ALL {
            let schema = ColumnSchema::new(vec![Field::new("c", ty)]);
            let rows = page(vec![vec![Value::Null, Value::Null]]);

            let table = ResultMaterializer::materialize(rows, &schema).unwrap();

            let data = table.column("c").unwrap();
            assert_eq!(data.len(), 2, "{ty}");
            assert_eq!(data.null_count(), 2, "{ty}");
            assert_eq!(data.kind(), ty.storage_kind(), "{ty}");
        }
    }

    #[test]
    fn test_null_position_preserved_between_values() {
        let schema = ColumnSchema::new(vec![Field::new("s", LogicalType::String)]);
        let rows = page(vec![vec![json!("x"), Value::Null, json!("")]]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(
            table.column("s"),
            Some(&ColumnData::Utf8(vec![
                Some("x".to_string()),
                None,
                Some(String::new())
            ]))
        );
    }

    #[test]
    fn test_boolean_only_exact_true_literal() {
        let schema = ColumnSchema::new(vec![Field::new("flag", LogicalType::Boolean)]);
        let rows = page(vec![vec![
            json!("true"),
            json!("false"),
            json!("True"),
            json!("1"),
            json!(""),
        ]]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(
            table.column("flag"),
            Some(&ColumnData::Boolean(vec![
                Some(true),
                Some(false),
                Some(false),
                Some(false),
                Some(false)
            ]))
        );
    }

    #[test]
    fn test_repeated_column_expansion() {
        let schema = ColumnSchema::new(vec![Field::repeated("v", LogicalType::Integer)]);
        let rows = page(vec![vec![
            json!(["1", "2"]),
            json!([]),
            json!(["10", "11", "12", "13", "14"]),
        ]]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(table.column_names(), vec!["v_0", "v_1", "v_2", "v_3", "v_4"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.column("v_0"),
            Some(&ColumnData::Float64(vec![Some(1.0), None, Some(10.0)]))
        );
        assert_eq!(
            table.column("v_1"),
            Some(&ColumnData::Float64(vec![Some(2.0), None, Some(11.0)]))
        );
        for name in ["v_2", "v_3", "v_4"] {
            let data = table.column(name).unwrap();
            assert!(data.is_null(0), "{name} row 0");
            assert!(data.is_null(1), "{name} row 1");
            assert!(!data.is_null(2), "{name} row 2");
        }
    }

    #[test]
    fn test_repeated_null_element_is_null() {
        let schema = ColumnSchema::new(vec![Field::repeated("tags", LogicalType::String)]);
        let rows = page(vec![vec![json!(["a", null]), json!(["b", "c"])]]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(
            table.column("tags_1"),
            Some(&ColumnData::Utf8(vec![None, Some("c".to_string())]))
        );
    }

    #[test]
    fn test_repeated_all_empty_emits_no_columns() {
        let schema = ColumnSchema::new(vec![
            Field::new("id", LogicalType::Integer),
            Field::repeated("tags", LogicalType::String),
        ]);
        let rows = page(vec![vec![json!(1), json!(2)], vec![json!([]), json!([])]]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(table.column_names(), vec!["id"]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_repeated_expands_in_place() {
        let schema = ColumnSchema::new(vec![
            Field::new("first", LogicalType::String),
            Field::repeated("mid", LogicalType::Boolean),
            Field::new("last", LogicalType::Float),
        ]);
        let rows = page(vec![
            vec![json!("a")],
            vec![json!(["true", "false"])],
            vec![json!("0.5")],
        ]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(table.column_names(), vec!["first", "mid_0", "mid_1", "last"]);
    }

    #[test]
    fn test_repeated_requires_sequence() {
        let schema = ColumnSchema::new(vec![Field::repeated("v", LogicalType::String)]);
        let rows = page(vec![vec![json!(["a"]), json!("b")]]);

        let err = ResultMaterializer::materialize(rows, &schema).unwrap_err();

        assert!(matches!(err, BqLiteError::MalformedInput(_)));
    }

    #[test]
    fn test_unknown_type_rejected_not_defaulted() {
        let err = Field::from_parts("area", "GEOGRAPHY", None).unwrap_err();
        match err {
            BqLiteError::UnsupportedType(name) => assert_eq!(name, "GEOGRAPHY"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_page_yields_empty_table() {
        let schema = ColumnSchema::new(vec![
            Field::new("a", LogicalType::Integer),
            Field::repeated("b", LogicalType::String),
        ]);

        let table = ResultMaterializer::materialize(RawRowPage::default(), &schema).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.row_count(), 0);

        let zero_rows = RawRowPage::from_rows(vec![], 2).unwrap();
        let table = ResultMaterializer::materialize(zero_rows, &schema).unwrap();
        assert_eq!(table.column_count(), 0);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_column_count_mismatch() {
        let schema = ColumnSchema::new(vec![Field::new("a", LogicalType::String)]);
        let rows = page(vec![vec![json!("x")], vec![json!("y")]]);

        let err = ResultMaterializer::materialize(rows, &schema).unwrap_err();

        assert!(matches!(err, BqLiteError::MalformedInput(_)));
    }

    #[test]
    fn test_uncastable_number_names_column() {
        let schema = ColumnSchema::new(vec![Field::new("price", LogicalType::Float)]);
        let rows = page(vec![vec![json!("abc")]]);

        let err = ResultMaterializer::materialize(rows, &schema).unwrap_err();

        assert!(matches!(err, BqLiteError::MalformedInput(_)));
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_text_types_pass_through() {
        let schema = ColumnSchema::new(vec![
            Field::new("d", LogicalType::Date),
            Field::new("t", LogicalType::Time),
            Field::new("dt", LogicalType::Datetime),
        ]);
        let rows = page(vec![
            vec![json!("2024-01-15")],
            vec![json!("12:30:00")],
            vec![json!("2024-01-15T12:30:00")],
        ]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        for column in table.columns() {
            assert_eq!(column.kind(), StorageKind::Utf8);
        }
        assert_eq!(
            table.column("t"),
            Some(&ColumnData::Utf8(vec![Some("12:30:00".to_string())]))
        );
    }

    #[test]
    fn test_timestamp_column() {
        let schema = ColumnSchema::new(vec![Field::new("ts", LogicalType::Timestamp)]);
        let rows = page(vec![vec![json!("1.7053218E9"), Value::Null]]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();

        assert_eq!(
            table.column("ts"),
            Some(&ColumnData::Timestamp(vec![
                Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap()),
                None
            ]))
        );
    }

    #[test]
    fn test_round_trip_through_inference() {
        let schema = ColumnSchema::new(vec![
            Field::new("name", LogicalType::String),
            Field::new("score", LogicalType::Float),
            Field::new("count", LogicalType::Integer),
            Field::new("active", LogicalType::Boolean),
            Field::new("seen", LogicalType::Timestamp),
        ]);
        let rows = page(vec![
            vec![json!("a")],
            vec![json!("1.5")],
            vec![json!("2")],
            vec![json!("true")],
            vec![json!("1.7053218E9")],
        ]);

        let table = ResultMaterializer::materialize(rows, &schema).unwrap();
        let inferred = SchemaInferrer::infer(&table);

        let types: Vec<_> = inferred.fields().iter().map(|f| f.logical_type).collect();
        assert_eq!(
            types,
            vec![
                LogicalType::String,
                LogicalType::Float,
                LogicalType::Float,
                LogicalType::Boolean,
                LogicalType::Timestamp,
            ]
        );
        assert!(inferred
            .fields()
            .iter()
            .all(|f| f.mode == FieldMode::Nullable));
    }
}
