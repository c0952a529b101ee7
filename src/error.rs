use gcp_bigquery_client::error::BQError;
use thiserror::Error;

use crate::executor::RowInsertError;

#[derive(Error, Debug)]
pub enum BqLiteError {
    #[error("Unsupported column type: {0}")]
    UnsupportedType(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Job execution failed: {0}")]
    JobExecution(String),

    #[error("Table {dataset}:{table} already exists")]
    TableAlreadyExists { dataset: String, table: String },

    #[error("Table {dataset}:{table} does not exist")]
    TableNotFound { dataset: String, table: String },

    #[error("Dataset {0} does not exist")]
    DatasetNotFound(String),

    #[error("Failed to insert {} row(s): {}", .0.len(), summarize_insert_errors(.0))]
    InsertRows(Vec<RowInsertError>),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("BigQuery error: {0}")]
    BigQuery(#[from] BQError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BqLiteError>;

fn summarize_insert_errors(errors: &[RowInsertError]) -> String {
    errors
        .iter()
        .map(|e| format!("row {}: {}", e.index, e.errors.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}
