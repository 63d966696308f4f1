//! Worker pool executing factorization jobs

pub mod pool;

pub use pool::{PoolError, PoolStats, WorkerPool};
