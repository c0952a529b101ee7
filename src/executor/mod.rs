mod client;
mod credentials;
mod gcp;
mod mock;
mod options;
mod warehouse;

pub use client::BqClient;
pub use credentials::Credentials;
pub use gcp::GcpWarehouse;
pub use mock::MockWarehouse;
pub use options::{ClientConfig, JobOutcome, QueryJobOptions, ReadOptions, WriteDisposition};
pub use warehouse::{
    JobRef, JobState, JobStatus, QueryJobRequest, QueryPage, RowInsertError, TableRef, Warehouse,
};
