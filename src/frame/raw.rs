use serde_json::Value;

use crate::error::{BqLiteError, Result};

/// Column-major untyped result values: one entry per schema column, each
/// holding one value per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRowPage {
    columns: Vec<Vec<Value>>,
}

impl RawRowPage {
    pub fn new(columns: Vec<Vec<Value>>) -> Self {
        Self { columns }
    }

    /// Transposes row-major values into column-major storage. Every row
    /// must carry exactly `width` values.
    pub fn from_rows(rows: Vec<Vec<Value>>, width: usize) -> Result<Self> {
        let mut columns: Vec<Vec<Value>> = (0..width)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(BqLiteError::MalformedInput(format!(
                    "row {} has {} values, expected {}",
                    index,
                    row.len(),
                    width
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Ok(Self { columns })
    }

    /// Appends the rows of the next page.
    pub fn append(&mut self, next: RawRowPage) -> Result<()> {
        if self.columns.is_empty() {
            self.columns = next.columns;
            return Ok(());
        }
        if next.columns.is_empty() {
            return Ok(());
        }
        if next.columns.len() != self.columns.len() {
            return Err(BqLiteError::MalformedInput(format!(
                "page has {} columns, expected {}",
                next.columns.len(),
                self.columns.len()
            )));
        }
        for (column, values) in self.columns.iter_mut().zip(next.columns) {
            column.extend(values);
        }
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn into_columns(self) -> Vec<Vec<Value>> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_rows_transposes() {
        let page = RawRowPage::from_rows(
            vec![vec![json!(1), json!("a")], vec![json!(2), Value::Null]],
            2,
        )
        .unwrap();
        assert_eq!(page.column_count(), 2);
        assert_eq!(page.row_count(), 2);
        assert_eq!(
            page.into_columns(),
            vec![vec![json!(1), json!(2)], vec![json!("a"), Value::Null]]
        );
    }

    #[test]
    fn test_from_rows_rejects_short_row() {
        let err = RawRowPage::from_rows(vec![vec![json!(1)]], 2).unwrap_err();
        assert!(matches!(err, BqLiteError::MalformedInput(_)));
    }

    #[test]
    fn test_append_pages() {
        let mut page = RawRowPage::from_rows(vec![vec![json!(1)]], 1).unwrap();
        page.append(RawRowPage::from_rows(vec![vec![json!(2)], vec![json!(3)]], 1).unwrap())
            .unwrap();
        assert_eq!(page.row_count(), 3);

        let err = page
            .append(RawRowPage::new(vec![vec![json!(4)], vec![json!(5)]]))
            .unwrap_err();
        assert!(matches!(err, BqLiteError::MalformedInput(_)));
    }

    #[test]
    fn test_zero_rows_is_empty() {
        let page = RawRowPage::from_rows(vec![], 3).unwrap();
        assert_eq!(page.column_count(), 3);
        assert!(page.is_empty());
    }
}
