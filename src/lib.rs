pub mod error;
pub mod executor;
pub mod frame;
pub mod materialize;
pub mod schema;

pub use error::{BqLiteError, Result};
pub use executor::{
    BqClient, ClientConfig, Credentials, GcpWarehouse, JobOutcome, JobRef, JobState, JobStatus,
    MockWarehouse, QueryJobOptions, QueryJobRequest, QueryPage, ReadOptions, RowInsertError,
    TableRef, Warehouse, WriteDisposition,
};
pub use frame::{Column, ColumnData, RawRowPage, StorageKind, TypedTable};
pub use materialize::ResultMaterializer;
pub use schema::{ColumnSchema, Field, FieldMode, LogicalType, SchemaInferrer};
