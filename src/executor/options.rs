use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BqLiteError;

const DEFAULT_JOB_POLL_SECS: u64 = 1;
const DEFAULT_WRITE_POLL_SECS: u64 = 10;
const DEFAULT_INSERT_BATCH_SIZE: usize = 500;
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 1800;

/// Floor for both status poll intervals.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Interval between status checks while a read query finishes.
    pub job_poll_interval: Duration,
    /// Interval between status checks of a query-to-table job.
    pub write_poll_interval: Duration,
    pub page_size: Option<u32>,
    pub insert_batch_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            job_poll_interval: Duration::from_secs(DEFAULT_JOB_POLL_SECS),
            write_poll_interval: Duration::from_secs(DEFAULT_WRITE_POLL_SECS),
            page_size: None,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            job_poll_interval: Duration::from_secs(
                env_or("BQLITE_JOB_POLL_SECS", DEFAULT_JOB_POLL_SECS).max(1),
            ),
            write_poll_interval: Duration::from_secs(
                env_or("BQLITE_WRITE_POLL_SECS", DEFAULT_WRITE_POLL_SECS).max(1),
            ),
            page_size: std::env::var("BQLITE_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok()),
            insert_batch_size: env_or("BQLITE_INSERT_BATCH_SIZE", DEFAULT_INSERT_BATCH_SIZE)
                .max(1),
        }
    }

    pub fn with_poll_intervals(mut self, job: Duration, write: Duration) -> Self {
        self.job_poll_interval = job.max(MIN_POLL_INTERVAL);
        self.write_poll_interval = write.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_insert_batch_size(mut self, batch_size: usize) -> Self {
        self.insert_batch_size = batch_size.max(1);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub use_legacy_sql: bool,
    pub use_query_cache: bool,
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteDisposition {
    #[default]
    WriteTruncate,
    WriteAppend,
    WriteEmpty,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
            WriteDisposition::WriteAppend => "WRITE_APPEND",
            WriteDisposition::WriteEmpty => "WRITE_EMPTY",
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteDisposition {
    type Err = BqLiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WRITE_TRUNCATE" | "TRUNCATE" => Ok(WriteDisposition::WriteTruncate),
            "WRITE_APPEND" | "APPEND" => Ok(WriteDisposition::WriteAppend),
            "WRITE_EMPTY" | "EMPTY" => Ok(WriteDisposition::WriteEmpty),
            other => Err(BqLiteError::MalformedInput(format!(
                "unknown write disposition '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryJobOptions {
    pub write_disposition: WriteDisposition,
    pub use_legacy_sql: bool,
    pub use_query_cache: bool,
    /// Total time to wait for the job; not an error when exceeded.
    pub wait_timeout: Duration,
}

impl Default for QueryJobOptions {
    fn default() -> Self {
        Self {
            write_disposition: WriteDisposition::default(),
            use_legacy_sql: false,
            use_query_cache: false,
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    TimedOut { job_id: String },
}

impl JobOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, JobOutcome::Done)
    }
}
