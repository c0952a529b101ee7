use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{BqLiteError, Result};
use crate::frame::{Column, ColumnData};
use crate::schema::LogicalType;

/// Accumulates cast values for one physical output column.
pub(crate) struct ColumnBuilder {
    name: String,
    logical_type: LogicalType,
    data: ColumnData,
}

impl ColumnBuilder {
    pub(crate) fn new(name: String, logical_type: LogicalType, capacity: usize) -> Self {
        Self {
            name,
            logical_type,
            data: ColumnData::with_capacity(logical_type.storage_kind(), capacity),
        }
    }

    pub(crate) fn push_null(&mut self) {
        match &mut self.data {
            ColumnData::Int64(v) => v.push(None),
            ColumnData::Float64(v) => v.push(None),
            ColumnData::Boolean(v) => v.push(None),
            ColumnData::Utf8(v) => v.push(None),
            ColumnData::Timestamp(v) => v.push(None),
            ColumnData::Date(v) => v.push(None),
            ColumnData::Json(v) => v.push(None),
        }
    }

    pub(crate) fn push(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            self.push_null();
            return Ok(());
        }

        match &mut self.data {
            ColumnData::Utf8(v) => v.push(Some(to_text(value))),
            ColumnData::Float64(v) => {
                let cast = to_float(&value)
                    .ok_or_else(|| cast_error(&self.name, self.logical_type, &value))?;
                v.push(Some(cast));
            }
            ColumnData::Boolean(v) => v.push(Some(to_flag(&value))),
            ColumnData::Timestamp(v) => {
                let cast = to_timestamp(&value)
                    .ok_or_else(|| cast_error(&self.name, self.logical_type, &value))?;
                v.push(Some(cast));
            }
            // `LogicalType::storage_kind` only yields the four kinds above.
            ColumnData::Int64(_) | ColumnData::Date(_) | ColumnData::Json(_) => unreachable!(
                "{} column '{}' stored as {}",
                self.logical_type,
                self.name,
                self.data.kind()
            ),
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Column {
        Column::new(self.name, self.data)
    }
}

fn cast_error(column: &str, logical_type: LogicalType, value: &Value) -> BqLiteError {
    BqLiteError::MalformedInput(format!(
        "column '{}': cannot cast {} to {}",
        column, value, logical_type
    ))
}

/// Only the exact text `true` is true.
pub(crate) fn to_flag(value: &Value) -> bool {
    match value {
        Value::String(s) => s == "true",
        Value::Bool(b) => *b,
        _ => false,
    }
}

pub(crate) fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Timestamps arrive as float epoch seconds (the REST encoding) or as
/// formatted text.
pub(crate) fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch_seconds),
        Value::String(s) => parse_timestamp_text(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(secs) = s.parse::<f64>() {
        return from_epoch_seconds(secs);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }

    let naive = s.strip_suffix(" UTC").unwrap_or(s);
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(ts.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round() as i64;
    DateTime::from_timestamp(
        micros.div_euclid(1_000_000),
        (micros.rem_euclid(1_000_000) * 1_000) as u32,
    )
}
