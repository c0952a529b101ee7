use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::credentials::Credentials;
use super::gcp::GcpWarehouse;
use super::options::{ClientConfig, JobOutcome, QueryJobOptions, ReadOptions, MIN_POLL_INTERVAL};
use super::warehouse::{JobRef, QueryJobRequest, RowInsertError, TableRef, Warehouse};
use crate::error::{BqLiteError, Result};
use crate::frame::{RawRowPage, TypedTable};
use crate::materialize::ResultMaterializer;
use crate::schema::{ColumnSchema, SchemaInferrer};

static DATASET_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,1024}$").expect("dataset pattern is valid"));

// Letters, marks, numbers, connectors, dashes and spaces.
static TABLE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}\p{M}\p{N}\p{Pc}\p{Pd}\p{Zs}]{1,1024}$").expect("table pattern is valid")
});

fn validate_identifiers(dataset_id: &str, table_id: &str) -> Result<()> {
    if !DATASET_ID.is_match(dataset_id) {
        return Err(BqLiteError::InvalidIdentifier(format!(
            "dataset id '{}'",
            dataset_id
        )));
    }
    if !TABLE_ID.is_match(table_id) {
        return Err(BqLiteError::InvalidIdentifier(format!(
            "table id '{}'",
            table_id
        )));
    }
    Ok(())
}

fn read_to_table_job_id(dataset_id: &str, table_id: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_read_to_bq{}_{}",
        dataset_id,
        table_id,
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

fn poll_ticks(timeout: Duration, interval: Duration) -> u128 {
    timeout.as_nanos() / interval.max(MIN_POLL_INTERVAL).as_nanos()
}

/// BigQuery helper client: table management, typed reads and row loading.
#[derive(Clone)]
pub struct BqClient {
    warehouse: Arc<dyn Warehouse>,
    config: ClientConfig,
}

impl BqClient {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_warehouse(
            Arc::new(GcpWarehouse::new(credentials)),
            ClientConfig::from_env(),
        )
    }

    pub fn with_warehouse(warehouse: Arc<dyn Warehouse>, config: ClientConfig) -> Self {
        Self { warehouse, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn prepare_table(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<TableRef> {
        validate_identifiers(dataset_id, table_id)?;

        if !self.warehouse.dataset_exists(project_id, dataset_id).await? {
            return Err(BqLiteError::DatasetNotFound(dataset_id.to_string()));
        }

        Ok(TableRef::new(project_id, dataset_id, table_id))
    }

    /// Creates an empty table whose schema is inferred from `template`.
    pub async fn create_table(
        &self,
        template: &TypedTable,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<()> {
        let schema = SchemaInferrer::infer(template);
        self.create_table_with_schema(&schema, project_id, dataset_id, table_id)
            .await
    }

    pub async fn create_table_with_schema(
        &self,
        schema: &ColumnSchema,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<()> {
        let table = self.prepare_table(project_id, dataset_id, table_id).await?;

        if self.warehouse.table_exists(&table).await? {
            return Err(BqLiteError::TableAlreadyExists {
                dataset: table.dataset_id,
                table: table.table_id,
            });
        }

        self.warehouse.create_table(&table, schema).await?;
        info!("Created table {}", table);
        Ok(())
    }

    pub async fn delete_table(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<()> {
        let table = self.prepare_table(project_id, dataset_id, table_id).await?;

        if !self.warehouse.table_exists(&table).await? {
            return Err(BqLiteError::TableNotFound {
                dataset: table.dataset_id,
                table: table.table_id,
            });
        }

        self.warehouse.delete_table(&table).await?;
        info!("Deleted table {}", table);
        Ok(())
    }

    pub async fn table_schema(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<ColumnSchema> {
        let table = self.prepare_table(project_id, dataset_id, table_id).await?;

        if !self.warehouse.table_exists(&table).await? {
            return Err(BqLiteError::TableNotFound {
                dataset: table.dataset_id,
                table: table.table_id,
            });
        }

        self.warehouse.table_schema(&table).await
    }

    /// Runs `sql` and materializes every result page.
    ///
    /// Returns `None` when the query produced no result schema (DDL and DML
    /// statements).
    pub async fn read(
        &self,
        sql: &str,
        project_id: &str,
        options: &ReadOptions,
    ) -> Result<Option<TypedTable>> {
        let mut page = self.warehouse.query(project_id, sql, options).await?;

        if !page.complete {
            let job = page.job.clone().ok_or_else(|| {
                BqLiteError::MalformedInput("incomplete query returned no job reference".into())
            })?;
            self.wait_for_job(&job).await?;
            page = self
                .warehouse
                .query_results(&job, None, self.config.page_size)
                .await?;
        }

        let schema = match page.schema.take() {
            Some(schema) => schema,
            None => {
                debug!("Query returned no schema");
                return Ok(None);
            }
        };

        let mut rows = RawRowPage::from_rows(std::mem::take(&mut page.rows), schema.len())?;
        let mut page_token = page.page_token.take();
        let mut pages = 1;

        while let Some(token) = page_token {
            let job = page.job.as_ref().ok_or_else(|| {
                BqLiteError::MalformedInput("paged result returned no job reference".into())
            })?;
            let next = self
                .warehouse
                .query_results(job, Some(&token), self.config.page_size)
                .await?;
            rows.append(RawRowPage::from_rows(next.rows, schema.len())?)?;
            page_token = next.page_token;
            pages += 1;
        }

        debug!(
            pages,
            rows = rows.row_count(),
            total_rows = ?page.total_rows,
            "Fetched query result"
        );

        ResultMaterializer::materialize(rows, &schema).map(Some)
    }

    /// Loads every row of `source` into the table, creating it from the
    /// inferred schema when it does not exist yet. Returns the number of
    /// rows sent.
    ///
    /// Stops at the first batch the service rejects rows from; later batches
    /// are never sent.
    pub async fn write(
        &self,
        source: &TypedTable,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<usize> {
        let table = self.prepare_table(project_id, dataset_id, table_id).await?;

        if self.warehouse.table_exists(&table).await? {
            debug!("Appending to existing table {}", table);
        } else {
            info!("Table {} does not exist.", table);
            let schema = SchemaInferrer::infer(source);
            self.warehouse.create_table(&table, &schema).await?;
            info!("Create Table {}.", table);
        }

        let total = source.row_count();
        let mut records = source.records().peekable();
        let mut offset = 0;

        while records.peek().is_some() {
            let batch: Vec<_> = records
                .by_ref()
                .take(self.config.insert_batch_size.max(1))
                .collect();
            let batch_len = batch.len();

            let rejected = self.warehouse.insert_rows(&table, batch).await?;
            if !rejected.is_empty() {
                let errors: Vec<RowInsertError> = rejected
                    .into_iter()
                    .map(|mut e| {
                        e.index += offset;
                        e
                    })
                    .collect();
                warn!(
                    sent = offset + batch_len,
                    total,
                    "Rows rejected while loading {}",
                    table
                );
                return Err(BqLiteError::InsertRows(errors));
            }
            offset += batch_len;
        }

        info!("Loaded {} rows into {}", total, table);
        Ok(total)
    }

    /// Runs `sql` as a job writing into the destination table and waits up
    /// to `options.wait_timeout` for it to finish.
    ///
    /// Running out of time is not an error: the job keeps running remotely
    /// and `JobOutcome::TimedOut` carries its id so the caller can check on
    /// it later.
    pub async fn read_to_table(
        &self,
        sql: &str,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
        options: &QueryJobOptions,
    ) -> Result<JobOutcome> {
        validate_identifiers(dataset_id, table_id)?;

        let request = QueryJobRequest {
            job_id: read_to_table_job_id(dataset_id, table_id),
            sql: sql.to_string(),
            destination: TableRef::new(project_id, dataset_id, table_id),
            write_disposition: options.write_disposition,
            use_legacy_sql: options.use_legacy_sql,
            use_query_cache: options.use_query_cache,
        };

        let job = self.warehouse.submit_query_job(&request).await?;
        info!(
            job_id = %job.job_id,
            disposition = %options.write_disposition,
            "Submitted query into {}",
            request.destination
        );

        let interval = self.config.write_poll_interval.max(MIN_POLL_INTERVAL);
        let mut remaining = poll_ticks(options.wait_timeout, interval);
        let mut status = self.warehouse.job_status(&job).await?;

        while remaining > 0 && !status.is_done() {
            remaining -= 1;
            tokio::time::sleep(interval).await;
            status = self.warehouse.job_status(&job).await?;
        }

        if !status.is_done() {
            warn!(
                job_id = %job.job_id,
                "Timeout. Write data into {}",
                request.destination
            );
            return Ok(JobOutcome::TimedOut { job_id: job.job_id });
        }

        if let Some(error) = status.error_result {
            return Err(BqLiteError::JobExecution(error));
        }

        info!("Wrote query result into {}", request.destination);
        Ok(JobOutcome::Done)
    }

    async fn wait_for_job(&self, job: &JobRef) -> Result<()> {
        loop {
            let status = self.warehouse.job_status(job).await?;
            if status.is_done() {
                return match status.error_result {
                    Some(error) => Err(BqLiteError::JobExecution(error)),
                    None => Ok(()),
                };
            }
            debug!(job_id = %job.job_id, state = ?status.state, "Waiting for job");
            tokio::time::sleep(self.config.job_poll_interval.max(MIN_POLL_INTERVAL)).await;
        }
    }
}
