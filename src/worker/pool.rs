//! Bounded worker pool running factorization jobs.
//!
//! Each accepted job occupies one slot (a semaphore permit) from hand-off
//! until its result has been written. When every slot is busy, `execute`
//! waits, which throttles the dispatcher. The factorization itself runs on
//! tokio's blocking thread pool so it never stalls the async workers.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::factor::Factorizer;
use crate::observability::Metrics;
use crate::queue::{Job, JobId};
use crate::status::{JobStatus, StatusStore};

/// Attempts at writing a job's final status before giving up
const PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool capacity must be positive")]
    InvalidCapacity,

    #[error("Worker pool closed, job {0} rejected")]
    Closed(JobId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub busy: usize,
}

/// Fixed-size pool of execution slots. Cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    capacity: usize,
    slots: Arc<Semaphore>,
    store: Arc<dyn StatusStore>,
    factorizer: Arc<dyn Factorizer>,
    metrics: Arc<Metrics>,
}

impl WorkerPool {
    pub fn new(
        capacity: usize,
        store: Arc<dyn StatusStore>,
        factorizer: Arc<dyn Factorizer>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }

        info!(capacity, "Creating worker pool");

        Ok(Self {
            inner: Arc::new(PoolInner {
                capacity,
                slots: Arc::new(Semaphore::new(capacity)),
                store,
                factorizer,
                metrics,
            }),
        })
    }

    /// Hand a job to the pool.
    ///
    /// Waits for a free slot, then returns as soon as the job is running.
    /// The job's outcome is published to the status store, never returned.
    pub async fn execute(&self, job: Job) -> Result<(), PoolError> {
        let permit = self
            .inner
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed(job.id))?;

        let inner = self.inner.clone();
        tokio::spawn(async move {
            // slot is released when the task ends, panics included
            let _permit = permit;
            inner.run(job).await;
        });

        Ok(())
    }

    /// Publish a failure status for a job the pool will never run
    pub async fn reject(&self, id: JobId, reason: &str) {
        self.inner.metrics.job_failed();
        self.inner
            .publish(id, JobStatus::Failed(reason.to_string()))
            .await;
    }

    /// Stop admitting jobs. Running jobs finish normally.
    pub fn close(&self) {
        self.inner.slots.close();
        info!("Worker pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.slots.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.inner.slots.available_permits();
        PoolStats {
            capacity: self.inner.capacity,
            busy: self.inner.capacity.saturating_sub(available),
        }
    }
}

impl PoolInner {
    async fn run(&self, job: Job) {
        let started = Instant::now();
        info!(job_id = %job.id, number = job.number, "Job kicked off");

        let factorizer = self.factorizer.clone();
        let number = job.number;
        let outcome = tokio::task::spawn_blocking(move || factorizer.factor(number)).await;

        let status = match outcome {
            Ok(Ok(factors)) => {
                info!(
                    job_id = %job.id,
                    factors = factors.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
                self.metrics.job_completed();
                JobStatus::Done(factors)
            }
            Ok(Err(e)) => {
                error!(job_id = %job.id, number, error = %e, "Factorization failed");
                self.metrics.job_failed();
                JobStatus::Failed(e.to_string())
            }
            Err(join_error) => {
                let reason = describe_join_error(join_error);
                error!(job_id = %job.id, number, reason = %reason, "Factorization aborted");
                self.metrics.job_failed();
                JobStatus::Failed(reason)
            }
        };

        self.publish(job.id, status).await;
    }

    /// Write the final status, retrying with a growing delay. If every
    /// attempt fails the job keeps its placeholder.
    async fn publish(&self, id: JobId, status: JobStatus) {
        let value = status.encode();

        for attempt in 1..=PUBLISH_ATTEMPTS {
            match self.store.set(&id.store_key(), &value).await {
                Ok(()) => {
                    debug!(job_id = %id, result = %value, attempt, "Result stored");
                    return;
                }
                Err(e) if attempt < PUBLISH_ATTEMPTS => {
                    self.metrics.store_error();
                    warn!(job_id = %id, attempt, error = %e, "Failed to store job result, retrying");
                    tokio::time::sleep(PUBLISH_RETRY_DELAY * attempt).await;
                }
                Err(e) => {
                    self.metrics.store_error();
                    error!(job_id = %id, attempt, error = %e, "Giving up on storing job result");
                }
            }
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        warn!("Factorization task cancelled");
        return "worker cancelled".to_string();
    }
    format!("worker panicked: {}", panic_message(err.into_panic()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
