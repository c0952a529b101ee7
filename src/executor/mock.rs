use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::options::ReadOptions;
use super::warehouse::{
    JobRef, JobStatus, QueryJobRequest, QueryPage, RowInsertError, TableRef, Warehouse,
};
use crate::error::{BqLiteError, Result};
use crate::schema::ColumnSchema;

const MOCK_LOCATION: &str = "US";

#[derive(Debug, Clone)]
struct MockTable {
    schema: ColumnSchema,
    rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone)]
struct MockQuery {
    schema: Option<ColumnSchema>,
    pages: Vec<Vec<Vec<Value>>>,
}

#[derive(Default)]
struct MockState {
    datasets: HashSet<(String, String)>,
    tables: HashMap<TableRef, MockTable>,
    queries: HashMap<String, MockQuery>,
    jobs: HashMap<String, MockQuery>,
    job_statuses: VecDeque<JobStatus>,
    pending_queries: bool,
    insert_errors: Vec<RowInsertError>,
    submitted: Vec<QueryJobRequest>,
    status_checks: usize,
    next_job: usize,
}

/// In-memory warehouse with scripted query results and job states.
#[derive(Default)]
pub struct MockWarehouse {
    state: Mutex<MockState>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_dataset(self, project_id: &str, dataset_id: &str) -> Self {
        self.state()
            .datasets
            .insert((project_id.to_string(), dataset_id.to_string()));
        self
    }

    pub fn with_table(self, table: TableRef, schema: ColumnSchema) -> Self {
        self.state().datasets.insert((
            table.project_id.clone(),
            table.dataset_id.clone(),
        ));
        self.state().tables.insert(
            table,
            MockTable {
                schema,
                rows: Vec::new(),
            },
        );
        self
    }

    /// Registers the result of `sql`, split into pages of row-major values.
    pub fn with_query(
        self,
        sql: &str,
        schema: Option<ColumnSchema>,
        pages: Vec<Vec<Vec<Value>>>,
    ) -> Self {
        self.state()
            .queries
            .insert(sql.to_string(), MockQuery { schema, pages });
        self
    }

    /// Queries report incomplete until their job is polled to DONE.
    pub fn with_pending_queries(self) -> Self {
        self.state().pending_queries = true;
        self
    }

    /// Statuses returned by successive `job_status` calls. Once exhausted,
    /// jobs report DONE.
    pub fn with_job_statuses(self, statuses: Vec<JobStatus>) -> Self {
        self.state().job_statuses = statuses.into();
        self
    }

    pub fn with_insert_errors(self, errors: Vec<RowInsertError>) -> Self {
        self.state().insert_errors = errors;
        self
    }

    pub fn has_table(&self, table: &TableRef) -> bool {
        self.state().tables.contains_key(table)
    }

    pub fn rows(&self, table: &TableRef) -> Option<Vec<Map<String, Value>>> {
        self.state().tables.get(table).map(|t| t.rows.clone())
    }

    pub fn submitted_jobs(&self) -> Vec<QueryJobRequest> {
        self.state().submitted.clone()
    }

    pub fn status_checks(&self) -> usize {
        self.state().status_checks
    }

    fn page_of(query: &MockQuery, index: usize, job: &JobRef) -> QueryPage {
        let next = index + 1;
        QueryPage {
            schema: query.schema.clone(),
            rows: query.pages.get(index).cloned().unwrap_or_default(),
            total_rows: Some(query.pages.iter().map(Vec::len).sum::<usize>() as u64),
            page_token: (next < query.pages.len()).then(|| next.to_string()),
            complete: true,
            job: Some(job.clone()),
        }
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn dataset_exists(&self, project_id: &str, dataset_id: &str) -> Result<bool> {
        Ok(self
            .state()
            .datasets
            .contains(&(project_id.to_string(), dataset_id.to_string())))
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        Ok(self.state().tables.contains_key(table))
    }

    async fn table_schema(&self, table: &TableRef) -> Result<ColumnSchema> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| BqLiteError::TableNotFound {
                dataset: table.dataset_id.clone(),
                table: table.table_id.clone(),
            })
    }

    async fn create_table(&self, table: &TableRef, schema: &ColumnSchema) -> Result<()> {
        let mut state = self.state();
        if state.tables.contains_key(table) {
            return Err(BqLiteError::TableAlreadyExists {
                dataset: table.dataset_id.clone(),
                table: table.table_id.clone(),
            });
        }
        state.tables.insert(
            table.clone(),
            MockTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<()> {
        self.state()
            .tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| BqLiteError::TableNotFound {
                dataset: table.dataset_id.clone(),
                table: table.table_id.clone(),
            })
    }

    async fn query(
        &self,
        project_id: &str,
        sql: &str,
        _options: &ReadOptions,
    ) -> Result<QueryPage> {
        let mut state = self.state();
        state.next_job += 1;
        let job = JobRef {
            project_id: project_id.to_string(),
            job_id: format!("mock_job_{}", state.next_job),
            location: Some(MOCK_LOCATION.to_string()),
        };

        let query = state.queries.get(sql).cloned().unwrap_or(MockQuery {
            schema: None,
            pages: Vec::new(),
        });
        state.jobs.insert(job.job_id.clone(), query.clone());

        if state.pending_queries {
            return Ok(QueryPage {
                complete: false,
                job: Some(job),
                ..Default::default()
            });
        }

        Ok(Self::page_of(&query, 0, &job))
    }

    async fn query_results(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        _page_size: Option<u32>,
    ) -> Result<QueryPage> {
        let state = self.state();
        let query = state
            .jobs
            .get(&job.job_id)
            .ok_or_else(|| BqLiteError::JobExecution(format!("unknown job {}", job.job_id)))?;

        let index = match page_token {
            Some(token) => token.parse().map_err(|_| {
                BqLiteError::MalformedInput(format!("invalid page token '{}'", token))
            })?,
            None => 0,
        };

        Ok(Self::page_of(query, index, job))
    }

    async fn submit_query_job(&self, request: &QueryJobRequest) -> Result<JobRef> {
        let mut state = self.state();
        state.submitted.push(request.clone());
        Ok(JobRef {
            project_id: request.destination.project_id.clone(),
            job_id: request.job_id.clone(),
            location: Some(MOCK_LOCATION.to_string()),
        })
    }

    async fn job_status(&self, _job: &JobRef) -> Result<JobStatus> {
        let mut state = self.state();
        state.status_checks += 1;
        Ok(state.job_statuses.pop_front().unwrap_or_else(JobStatus::done))
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: Vec<Map<String, Value>>,
    ) -> Result<Vec<RowInsertError>> {
        let mut state = self.state();
        if !state.insert_errors.is_empty() {
            return Ok(std::mem::take(&mut state.insert_errors));
        }
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| BqLiteError::TableNotFound {
                dataset: table.dataset_id.clone(),
                table: table.table_id.clone(),
            })?;
        target.rows.extend(rows);
        Ok(Vec::new())
    }
}
