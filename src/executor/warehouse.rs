use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use super::options::{ReadOptions, WriteDisposition};
use crate::error::Result;
use crate::schema::ColumnSchema;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    pub project_id: String,
    pub job_id: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done,
}

impl JobState {
    pub fn from_service(state: &str) -> Self {
        match state {
            "DONE" => JobState::Done,
            "RUNNING" => JobState::Running,
            _ => JobState::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub error_result: Option<String>,
}

impl JobStatus {
    pub fn done() -> Self {
        Self {
            state: JobState::Done,
            error_result: None,
        }
    }

    pub fn running() -> Self {
        Self {
            state: JobState::Running,
            error_result: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: JobState::Done,
            error_result: Some(error.into()),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }
}

/// One page of a query result, row-major as the service returns it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub schema: Option<ColumnSchema>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: Option<u64>,
    pub page_token: Option<String>,
    pub complete: bool,
    pub job: Option<JobRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryJobRequest {
    pub job_id: String,
    pub sql: String,
    pub destination: TableRef,
    pub write_disposition: WriteDisposition,
    pub use_legacy_sql: bool,
    pub use_query_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInsertError {
    pub index: usize,
    pub errors: Vec<String>,
}

/// Remote operations the client needs from the warehouse service.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn dataset_exists(&self, project_id: &str, dataset_id: &str) -> Result<bool>;

    async fn table_exists(&self, table: &TableRef) -> Result<bool>;

    async fn table_schema(&self, table: &TableRef) -> Result<ColumnSchema>;

    async fn create_table(&self, table: &TableRef, schema: &ColumnSchema) -> Result<()>;

    async fn delete_table(&self, table: &TableRef) -> Result<()>;

    /// Runs a query synchronously. The returned page may be incomplete, in
    /// which case rows must be fetched with `query_results` once the job is
    /// done.
    async fn query(&self, project_id: &str, sql: &str, options: &ReadOptions)
        -> Result<QueryPage>;

    async fn query_results(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<QueryPage>;

    async fn submit_query_job(&self, request: &QueryJobRequest) -> Result<JobRef>;

    async fn job_status(&self, job: &JobRef) -> Result<JobStatus>;

    /// Streams rows into a table, returning the rows the service rejected.
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: Vec<Map<String, Value>>,
    ) -> Result<Vec<RowInsertError>>;
}
