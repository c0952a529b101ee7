use super::field::{Field, LogicalType};
use super::table::ColumnSchema;
use crate::frame::{StorageKind, TypedTable};

pub struct SchemaInferrer;

impl SchemaInferrer {
    /// Derives a remote-table schema from column storage. Every field is
    /// NULLABLE; repeated structure is never inferred.
    pub fn infer(table: &TypedTable) -> ColumnSchema {
        table
            .columns()
            .iter()
            .map(|column| Field::new(column.name.clone(), Self::logical_type(column.kind())))
            .collect()
    }

    pub fn logical_type(kind: StorageKind) -> LogicalType {
        match kind {
            StorageKind::Int64 => LogicalType::Integer,
            StorageKind::Boolean => LogicalType::Boolean,
            StorageKind::Float64 => LogicalType::Float,
            StorageKind::Utf8 | StorageKind::Json => LogicalType::String,
            StorageKind::Timestamp => LogicalType::Timestamp,
            _ => LogicalType::String,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, ColumnData};
    use crate::schema::FieldMode;
    use chrono::NaiveDate;

    #[test]
    fn test_infer_maps_every_storage_kind() {
        let table = TypedTable::new(vec![
            Column::new("i", ColumnData::Int64(vec![Some(1)])),
            Column::new("b", ColumnData::Boolean(vec![Some(true)])),
            Column::new("f", ColumnData::Float64(vec![None])),
            Column::new("s", ColumnData::Utf8(vec![Some("x".into())])),
            Column::new("o", ColumnData::Json(vec![Some(serde_json::json!({"k": 1}))])),
            Column::new("ts", ColumnData::Timestamp(vec![None])),
            Column::new(
                "d",
                ColumnData::Date(vec![NaiveDate::from_ymd_opt(2024, 1, 1)]),
            ),
        ])
        .unwrap();

        let schema = SchemaInferrer::infer(&table);

        let got: Vec<_> = schema
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.logical_type, f.mode))
            .collect();
        assert_eq!(
            got,
            vec![
                ("i", LogicalType::Integer, FieldMode::Nullable),
                ("b", LogicalType::Boolean, FieldMode::Nullable),
                ("f", LogicalType::Float, FieldMode::Nullable),
                ("s", LogicalType::String, FieldMode::Nullable),
                ("o", LogicalType::String, FieldMode::Nullable),
                ("ts", LogicalType::Timestamp, FieldMode::Nullable),
                ("d", LogicalType::String, FieldMode::Nullable),
            ]
        );
    }

    #[test]
    fn test_infer_empty_table() {
        assert!(SchemaInferrer::infer(&TypedTable::empty()).is_empty());
    }
}
