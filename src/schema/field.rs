use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BqLiteError, Result};
use crate::frame::StorageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalType {
    String,
    Datetime,
    Date,
    Time,
    Float,
    Integer,
    Boolean,
    Timestamp,
}

impl LogicalType {
    pub const ALL: [LogicalType; 8] = [
        LogicalType::String,
        LogicalType::Datetime,
        LogicalType::Date,
        LogicalType::Time,
        LogicalType::Float,
        LogicalType::Integer,
        LogicalType::Boolean,
        LogicalType::Timestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::String => "STRING",
            LogicalType::Datetime => "DATETIME",
            LogicalType::Date => "DATE",
            LogicalType::Time => "TIME",
            LogicalType::Float => "FLOAT",
            LogicalType::Integer => "INTEGER",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Timestamp => "TIMESTAMP",
        }
    }

    /// Storage used for values of this type once a result is materialized.
    ///
    /// INTEGER is read back as float so that a nullable integer column keeps
    /// a representation for missing values next to real ones.
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            LogicalType::String | LogicalType::Datetime | LogicalType::Date | LogicalType::Time => {
                StorageKind::Utf8
            }
            LogicalType::Float | LogicalType::Integer => StorageKind::Float64,
            LogicalType::Boolean => StorageKind::Boolean,
            LogicalType::Timestamp => StorageKind::Timestamp,
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = BqLiteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STRING" => Ok(LogicalType::String),
            "DATETIME" => Ok(LogicalType::Datetime),
            "DATE" => Ok(LogicalType::Date),
            "TIME" => Ok(LogicalType::Time),
            "FLOAT" | "FLOAT64" => Ok(LogicalType::Float),
            "INTEGER" | "INT64" => Ok(LogicalType::Integer),
            "BOOLEAN" | "BOOL" => Ok(LogicalType::Boolean),
            "TIMESTAMP" => Ok(LogicalType::Timestamp),
            _ => Err(BqLiteError::UnsupportedType(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogicalType {
    type Error = BqLiteError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LogicalType> for String {
    fn from(value: LogicalType) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

impl FieldMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMode::Nullable => "NULLABLE",
            FieldMode::Required => "REQUIRED",
            FieldMode::Repeated => "REPEATED",
        }
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self, FieldMode::Repeated)
    }
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldMode {
    type Err = BqLiteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NULLABLE" => Ok(FieldMode::Nullable),
            "REQUIRED" => Ok(FieldMode::Required),
            "REPEATED" => Ok(FieldMode::Repeated),
            other => Err(BqLiteError::MalformedInput(format!(
                "unknown field mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    #[serde(default)]
    pub mode: FieldMode,
}

impl Field {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            mode: FieldMode::Nullable,
        }
    }

    pub fn repeated(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            mode: FieldMode::Repeated,
        }
    }

    /// Builds a field from the type and mode strings a remote schema carries.
    /// A missing mode means NULLABLE.
    pub fn from_parts(name: impl Into<String>, type_name: &str, mode: Option<&str>) -> Result<Self> {
        let mode = match mode {
            Some(m) => m.parse()?,
            None => FieldMode::Nullable,
        };
        Ok(Self {
            name: name.into(),
            logical_type: type_name.parse()?,
            mode,
        })
    }
}
