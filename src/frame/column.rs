use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Timestamp,
    Date,
    Json,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::Int64 => "int64",
            StorageKind::Float64 => "float64",
            StorageKind::Boolean => "bool",
            StorageKind::Utf8 => "utf8",
            StorageKind::Timestamp => "timestamp[us, UTC]",
            StorageKind::Date => "date",
            StorageKind::Json => "object",
        };
        f.write_str(name)
    }
}

/// Nullable column storage. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Utf8(Vec<Option<String>>),
    Timestamp(Vec<Option<DateTime<Utc>>>),
    Date(Vec<Option<NaiveDate>>),
    Json(Vec<Option<Value>>),
}

impl ColumnData {
    pub fn empty(kind: StorageKind) -> Self {
        Self::with_capacity(kind, 0)
    }

    pub fn with_capacity(kind: StorageKind, capacity: usize) -> Self {
        match kind {
            StorageKind::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            StorageKind::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            StorageKind::Boolean => ColumnData::Boolean(Vec::with_capacity(capacity)),
            StorageKind::Utf8 => ColumnData::Utf8(Vec::with_capacity(capacity)),
            StorageKind::Timestamp => ColumnData::Timestamp(Vec::with_capacity(capacity)),
            StorageKind::Date => ColumnData::Date(Vec::with_capacity(capacity)),
            StorageKind::Json => ColumnData::Json(Vec::with_capacity(capacity)),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            ColumnData::Int64(_) => StorageKind::Int64,
            ColumnData::Float64(_) => StorageKind::Float64,
            ColumnData::Boolean(_) => StorageKind::Boolean,
            ColumnData::Utf8(_) => StorageKind::Utf8,
            ColumnData::Timestamp(_) => StorageKind::Timestamp,
            ColumnData::Date(_) => StorageKind::Date,
            ColumnData::Json(_) => StorageKind::Json,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Json(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Int64(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Float64(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Boolean(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Utf8(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Timestamp(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Date(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Json(v) => v.get(row).map_or(true, Option::is_none),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    /// JSON form of a single cell as the streaming insert API expects it.
    ///
    /// Nulls and NaN floats come back as `None`; the service stores an
    /// omitted field as NULL. Timestamps are float epoch seconds.
    pub fn insert_value(&self, row: usize) -> Option<Value> {
        match self {
            ColumnData::Int64(v) => v.get(row).copied().flatten().map(Value::from),
            ColumnData::Float64(v) => v
                .get(row)
                .copied()
                .flatten()
                .filter(|f| !f.is_nan())
                .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number)),
            ColumnData::Boolean(v) => v.get(row).copied().flatten().map(Value::Bool),
            ColumnData::Utf8(v) => v.get(row).cloned().flatten().map(Value::String),
            ColumnData::Timestamp(v) => v
                .get(row)
                .copied()
                .flatten()
                .and_then(|ts| serde_json::Number::from_f64(epoch_seconds(&ts)))
                .map(Value::Number),
            ColumnData::Date(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
            ColumnData::Json(v) => v.get(row).cloned().flatten().filter(|j| !j.is_null()),
        }
    }

    /// Human readable cell text, empty for nulls.
    pub fn display_value(&self, row: usize) -> String {
        match self {
            ColumnData::Timestamp(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.f UTC").to_string())
                .unwrap_or_default(),
            ColumnData::Utf8(v) => v.get(row).cloned().flatten().unwrap_or_default(),
            ColumnData::Float64(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|f| f.to_string())
                .unwrap_or_default(),
            _ => match self.insert_value(row) {
                Some(Value::String(s)) => s,
                Some(value) => value.to_string(),
                None => String::new(),
            },
        }
    }
}

fn epoch_seconds(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_insert_value_skips_nulls_and_nan() {
        let data = ColumnData::Float64(vec![Some(1.5), None, Some(f64::NAN)]);
        assert_eq!(data.insert_value(0), Some(serde_json::json!(1.5)));
        assert_eq!(data.insert_value(1), None);
        assert_eq!(data.insert_value(2), None);
    }

    #[test]
    fn test_insert_value_timestamp_as_epoch_seconds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let data = ColumnData::Timestamp(vec![Some(ts)]);
        assert_eq!(data.insert_value(0), Some(serde_json::json!(1705276800.0)));
    }

    #[test]
    fn test_null_count() {
        let data = ColumnData::Utf8(vec![Some("a".into()), None, None]);
        assert_eq!(data.null_count(), 2);
        assert_eq!(data.kind(), StorageKind::Utf8);
    }

    #[test]
    fn test_display_value() {
        let data = ColumnData::Boolean(vec![Some(true), None]);
        assert_eq!(data.display_value(0), "true");
        assert_eq!(data.display_value(1), "");
    }
}
