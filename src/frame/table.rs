use serde_json::{Map, Value};

use super::column::{Column, ColumnData};
use crate::error::{BqLiteError, Result};

/// Row-aligned named columns. Every column has the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedTable {
    columns: Vec<Column>,
}

impl TypedTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut table = Self::empty();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(BqLiteError::MalformedInput(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    first.len()
                )));
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.data)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Row `row` as an insert record, with missing values left out.
    pub fn record(&self, row: usize) -> Map<String, Value> {
        self.columns
            .iter()
            .filter_map(|c| c.data.insert_value(row).map(|v| (c.name.clone(), v)))
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        (0..self.row_count()).map(move |row| self.record(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TypedTable {
        TypedTable::new(vec![
            Column::new("id", ColumnData::Int64(vec![Some(1), Some(2)])),
            Column::new("name", ColumnData::Utf8(vec![Some("a".into()), None])),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let mut table = sample();
        let err = table
            .push_column(Column::new("flag", ColumnData::Boolean(vec![Some(true)])))
            .unwrap_err();
        assert!(matches!(err, BqLiteError::MalformedInput(_)));
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_shape_accessors() {
        let table = sample();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["id", "name"]);
        assert!(table.column("name").is_some());
        assert!(table.column("missing").is_none());
        assert!(TypedTable::empty().is_empty());
        assert_eq!(TypedTable::empty().row_count(), 0);
    }

    #[test]
    fn test_records_omit_nulls() {
        let table = sample();
        let records: Vec<_> = table.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(Value::Object(records[0].clone()), json!({"id": 1, "name": "a"}));
        assert_eq!(Value::Object(records[1].clone()), json!({"id": 2}));
    }
}
