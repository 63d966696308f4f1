//! Status store: where job state is published
//!
//! Every job has exactly one entry, keyed by its decimal id. The value is a
//! plain string so any key-value service can hold it:
//!
//! - `Calculating...` while the job is queued or running
//! - `2,2,3` (comma-joined factors, possibly empty) once done
//! - `Failed: <reason>` if the worker could not produce a result
//!
//! Backends implement [`StatusStore`]:
//! - [`RedisStatusStore`] - external Redis, bounded connection pool
//! - [`FjallStatusStore`] - embedded Fjall keyspace (single node)
//! - [`MemoryStatusStore`] - process-local map (development, tests)

mod fjall_store;
mod memory;
mod redis_store;

pub use fjall_store::FjallStatusStore;
pub use memory::MemoryStatusStore;
pub use redis_store::{ConnectionPool, PooledConnection, RedisPool, RedisStatusStore};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::factor::format_factors;

/// Placeholder written at submission time
pub const IN_PROGRESS: &str = "Calculating...";

const FAILED_PREFIX: &str = "Failed: ";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Value for key {0} is not valid UTF-8")]
    InvalidUtf8(String),

    #[error("Connection pool closed")]
    PoolClosed,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Key-value contract required from the status backend.
///
/// All methods may be called concurrently from many tasks.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write `value` only if `key` is absent. Returns whether it was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Round-trip to the backend
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Make every completed write durable. Called once at shutdown.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Connection pool occupancy, for backends that pool connections
    fn connection_stats(&self) -> Option<ConnectionStats> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub max: usize,
    pub available: usize,
}

/// Typed view of a stored status value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Done(Vec<u64>),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    InProgress,
    Done,
    Failed,
}

impl JobStatus {
    pub fn encode(&self) -> String {
        match self {
            JobStatus::InProgress => IN_PROGRESS.to_string(),
            JobStatus::Done(factors) => format_factors(factors),
            JobStatus::Failed(reason) => format!("{FAILED_PREFIX}{reason}"),
        }
    }

    /// Parse a stored value. Returns `None` for text this service never writes.
    pub fn parse(value: &str) -> Option<Self> {
        if value == IN_PROGRESS {
            return Some(JobStatus::InProgress);
        }
        if let Some(reason) = value.strip_prefix(FAILED_PREFIX) {
            return Some(JobStatus::Failed(reason.to_string()));
        }
        if value.is_empty() {
            return Some(JobStatus::Done(Vec::new()));
        }

        value
            .split(',')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
            .map(JobStatus::Done)
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            JobStatus::InProgress => StatusKind::InProgress,
            JobStatus::Done(_) => StatusKind::Done,
            JobStatus::Failed(_) => StatusKind::Failed,
        }
    }
}

/// Open the configured backend and verify it answers.
///
/// A store that cannot be reached here is fatal: the caller must not start
/// serving without one.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn StatusStore>> {
    let store: Arc<dyn StatusStore> = match config.backend {
        StoreBackend::Redis => Arc::new(RedisStatusStore::connect(&config.redis).await?),
        StoreBackend::Fjall => Arc::new(FjallStatusStore::open(&config.fjall.path)?),
        StoreBackend::Memory => Arc::new(MemoryStatusStore::new()),
    };

    store
        .ping()
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    info!(backend = store.backend(), "Status store connected");
    Ok(store)
}
