use async_trait::async_trait;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::field_type::FieldType;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::job::Job;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::table::Table;
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::model::table_data_insert_all_response::TableDataInsertAllResponse;
use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;
use gcp_bigquery_client::model::table_row::TableRow;
use gcp_bigquery_client::model::table_schema::TableSchema;
use gcp_bigquery_client::Client;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use super::credentials::Credentials;
use super::options::ReadOptions;
use super::warehouse::{
    JobRef, JobState, JobStatus, QueryJobRequest, QueryPage, RowInsertError, TableRef, Warehouse,
};
use crate::error::{BqLiteError, Result};
use crate::schema::{ColumnSchema, Field, LogicalType};

/// Warehouse backed by the BigQuery REST API.
///
/// The SDK client is built on first use and reused for the lifetime of the
/// warehouse, so credentials are resolved at most once.
pub struct GcpWarehouse {
    credentials: Credentials,
    client: OnceCell<Client>,
}

impl GcpWarehouse {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| self.credentials.connect())
            .await
    }
}

fn is_not_found(err: &BQError) -> bool {
    matches!(err, BQError::ResponseError { error } if error.error.code == 404)
}

fn field_type(logical_type: LogicalType) -> FieldType {
    match logical_type {
        LogicalType::String => FieldType::String,
        LogicalType::Datetime => FieldType::Datetime,
        LogicalType::Date => FieldType::Date,
        LogicalType::Time => FieldType::Time,
        LogicalType::Float => FieldType::Float,
        LogicalType::Integer => FieldType::Integer,
        LogicalType::Boolean => FieldType::Boolean,
        LogicalType::Timestamp => FieldType::Timestamp,
    }
}

fn to_table_schema(schema: &ColumnSchema) -> TableSchema {
    let fields = schema
        .fields()
        .iter()
        .map(|field| {
            let mut remote = TableFieldSchema::new(&field.name, field_type(field.logical_type));
            remote.mode = Some(field.mode.as_str().to_string());
            remote
        })
        .collect();
    TableSchema::new(fields)
}

fn from_table_schema(schema: &TableSchema) -> Result<ColumnSchema> {
    schema
        .fields
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(from_field_schema)
        .collect::<Result<Vec<_>>>()
        .map(ColumnSchema::new)
}

fn from_field_schema(field: &TableFieldSchema) -> Result<Field> {
    let type_name = match serde_json::to_value(&field.r#type)? {
        Value::String(name) => name,
        other => return Err(BqLiteError::UnsupportedType(other.to_string())),
    };
    Field::from_parts(field.name.clone(), &type_name, field.mode.as_deref())
}

/// Strips the `{"v": ...}` wrappers the REST API puts around repeated
/// values.
fn unwrap_cell(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("v") => {
                        unwrap_cell(obj.remove("v").unwrap_or(Value::Null))
                    }
                    other => unwrap_cell(other),
                })
                .collect(),
        ),
        other => other,
    }
}

fn to_rows(rows: Option<Vec<TableRow>>) -> Vec<Vec<Value>> {
    rows.unwrap_or_default()
        .into_iter()
        .map(|row| {
            row.columns
                .unwrap_or_default()
                .into_iter()
                .map(|cell| cell.value.map(unwrap_cell).unwrap_or(Value::Null))
                .collect()
        })
        .collect()
}

fn to_job_ref(reference: Option<JobReference>, project_id: &str) -> Option<JobRef> {
    let reference = reference?;
    Some(JobRef {
        project_id: reference
            .project_id
            .unwrap_or_else(|| project_id.to_string()),
        job_id: reference.job_id?,
        location: reference.location,
    })
}

struct RawResponse {
    schema: Option<TableSchema>,
    rows: Option<Vec<TableRow>>,
    total_rows: Option<String>,
    page_token: Option<String>,
    job_complete: Option<bool>,
    job_reference: Option<JobReference>,
}

impl RawResponse {
    fn into_page(self, project_id: &str) -> Result<QueryPage> {
        let schema = self.schema.as_ref().map(from_table_schema).transpose()?;
        Ok(QueryPage {
            schema,
            rows: to_rows(self.rows),
            total_rows: self.total_rows.and_then(|n| n.parse().ok()),
            page_token: self.page_token.filter(|t| !t.is_empty()),
            complete: self.job_complete.unwrap_or(true),
            job: to_job_ref(self.job_reference, project_id),
        })
    }
}

fn to_insert_errors(response: TableDataInsertAllResponse) -> Vec<RowInsertError> {
    response
        .insert_errors
        .unwrap_or_default()
        .into_iter()
        .map(|entry| RowInsertError {
            index: entry
                .index
                .and_then(|i| usize::try_from(i).ok())
                .unwrap_or_default(),
            errors: entry
                .errors
                .unwrap_or_default()
                .into_iter()
                .map(|e| e.message.clone().unwrap_or_else(|| e.to_string()))
                .collect(),
        })
        .collect()
}

#[async_trait]
impl Warehouse for GcpWarehouse {
    async fn dataset_exists(&self, project_id: &str, dataset_id: &str) -> Result<bool> {
        let client = self.client().await?;
        match client.dataset().get(project_id, dataset_id).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let client = self.client().await?;
        let result = client
            .table()
            .get(&table.project_id, &table.dataset_id, &table.table_id, None)
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn table_schema(&self, table: &TableRef) -> Result<ColumnSchema> {
        let client = self.client().await?;
        let remote = client
            .table()
            .get(&table.project_id, &table.dataset_id, &table.table_id, None)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    BqLiteError::TableNotFound {
                        dataset: table.dataset_id.clone(),
                        table: table.table_id.clone(),
                    }
                } else {
                    e.into()
                }
            })?;
        from_table_schema(&remote.schema)
    }

    async fn create_table(&self, table: &TableRef, schema: &ColumnSchema) -> Result<()> {
        let client = self.client().await?;
        debug!(table = %table, fields = schema.len(), "Creating table");
        client
            .table()
            .create(Table::new(
                &table.project_id,
                &table.dataset_id,
                &table.table_id,
                to_table_schema(schema),
            ))
            .await?;
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<()> {
        let client = self.client().await?;
        debug!(table = %table, "Deleting table");
        client
            .table()
            .delete(&table.project_id, &table.dataset_id, &table.table_id)
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        project_id: &str,
        sql: &str,
        options: &ReadOptions,
    ) -> Result<QueryPage> {
        let client = self.client().await?;

        let mut request = QueryRequest::new(sql);
        request.use_legacy_sql = options.use_legacy_sql;
        request.use_query_cache = Some(options.use_query_cache);
        request.max_results = options.max_results.map(|n| n as i32);

        debug!(project_id, "Running query");
        let response = client.job().query(project_id, request).await?;

        RawResponse {
            schema: response.schema,
            rows: response.rows,
            total_rows: response.total_rows,
            page_token: response.page_token,
            job_complete: response.job_complete,
            job_reference: response.job_reference,
        }
        .into_page(project_id)
    }

    async fn query_results(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<QueryPage> {
        let client = self.client().await?;
        let parameters = GetQueryResultsParameters {
            location: job.location.clone(),
            max_results: page_size.map(|n| n as i32),
            page_token: page_token.map(str::to_string),
            ..Default::default()
        };

        debug!(job_id = %job.job_id, page_token, "Fetching result page");
        let response = client
            .job()
            .get_query_results(&job.project_id, &job.job_id, parameters)
            .await?;

        RawResponse {
            schema: response.schema,
            rows: response.rows,
            total_rows: response.total_rows,
            page_token: response.page_token,
            job_complete: response.job_complete,
            job_reference: response.job_reference,
        }
        .into_page(&job.project_id)
    }

    async fn submit_query_job(&self, request: &QueryJobRequest) -> Result<JobRef> {
        let client = self.client().await?;
        let destination = &request.destination;

        let job: Job = serde_json::from_value(json!({
            "jobReference": {
                "projectId": destination.project_id,
                "jobId": request.job_id,
            },
            "configuration": {
                "query": {
                    "query": request.sql,
                    "destinationTable": {
                        "projectId": destination.project_id,
                        "datasetId": destination.dataset_id,
                        "tableId": destination.table_id,
                    },
                    "writeDisposition": request.write_disposition.as_str(),
                    "useLegacySql": request.use_legacy_sql,
                    "useQueryCache": request.use_query_cache,
                }
            }
        }))?;

        debug!(job_id = %request.job_id, destination = %destination, "Submitting query job");
        let submitted = client.job().insert(&destination.project_id, job).await?;

        Ok(
            to_job_ref(submitted.job_reference, &destination.project_id).unwrap_or_else(|| JobRef {
                project_id: destination.project_id.clone(),
                job_id: request.job_id.clone(),
                location: None,
            }),
        )
    }

    async fn job_status(&self, job: &JobRef) -> Result<JobStatus> {
        let client = self.client().await?;
        let remote = client
            .job()
            .get_job(&job.project_id, &job.job_id, job.location.as_deref())
            .await?;

        let status = remote.status;
        let state = status
            .as_ref()
            .and_then(|s| s.state.as_deref())
            .map(JobState::from_service)
            .unwrap_or(JobState::Pending);
        let error_result = status.and_then(|s| s.error_result).map(|e| {
            e.message
                .or(e.reason)
                .unwrap_or_else(|| "unknown error".to_string())
        });

        Ok(JobStatus {
            state,
            error_result,
        })
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: Vec<Map<String, Value>>,
    ) -> Result<Vec<RowInsertError>> {
        let client = self.client().await?;

        let mut request = TableDataInsertAllRequest::new();
        for row in rows {
            request.add_row(None, row)?;
        }

        let response = client
            .tabledata()
            .insert_all(&table.project_id, &table.dataset_id, &table.table_id, request)
            .await?;

        Ok(to_insert_errors(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldMode;

    #[test]
    fn test_unwrap_repeated_cells() {
        let cell = json!([{"v": "a"}, {"v": null}, {"v": "c"}]);
        assert_eq!(unwrap_cell(cell), json!(["a", null, "c"]));
        assert_eq!(unwrap_cell(json!("scalar")), json!("scalar"));
    }

    #[test]
    fn test_schema_conversion_round_trip() {
        let schema = ColumnSchema::new(vec![
            Field::new("id", LogicalType::Integer),
            Field::repeated("tags", LogicalType::String),
            Field::new("seen", LogicalType::Timestamp),
        ]);

        let back = from_table_schema(&to_table_schema(&schema)).unwrap();

        assert_eq!(back, schema);
        assert_eq!(back.fields()[1].mode, FieldMode::Repeated);
    }

    #[test]
    fn test_insert_errors_from_response() {
        let response: TableDataInsertAllResponse = serde_json::from_value(json!({
            "kind": "bigquery#tableDataInsertAllResponse",
            "insertErrors": [
                {"index": 2, "errors": [{"reason": "invalid", "message": "no such field: x"}]}
            ]
        }))
        .unwrap();

        let errors = to_insert_errors(response);

        assert_eq!(
            errors,
            vec![RowInsertError {
                index: 2,
                errors: vec!["no such field: x".to_string()],
            }]
        );
        assert!(to_insert_errors(TableDataInsertAllResponse::default()).is_empty());
    }
}
