//! Submission and result lookup, the two operations exposed to transports

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::observability::Metrics;
use crate::queue::{Job, JobId, JobIdSource, JobQueue, QueueError};
use crate::status::{IN_PROGRESS, JobStatus, StatusStore, StoreError};

/// How many candidate ids to try before giving up on a submission
const MAX_ID_ATTEMPTS: usize = 16;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Status store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job queue unavailable: {0}")]
    Queue(#[from] QueueError),

    #[error("No free job id after {0} attempts")]
    IdsExhausted(usize),
}

pub struct FactorService {
    queue: JobQueue,
    store: Arc<dyn StatusStore>,
    ids: Arc<dyn JobIdSource>,
    metrics: Arc<Metrics>,
}

impl FactorService {
    pub fn new(
        queue: JobQueue,
        store: Arc<dyn StatusStore>,
        ids: Arc<dyn JobIdSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            queue,
            store,
            ids,
            metrics,
        }
    }

    /// Submit `number` for factorization and return its job id.
    ///
    /// The placeholder status is stored before the job is queued, so the id
    /// resolves as soon as this returns and a fast worker's result can never
    /// be overwritten by it.
    pub async fn submit(&self, number: i64) -> Result<JobId, ServiceError> {
        let id = self.reserve_id().await?;

        if let Err(e) = self.queue.enqueue(Job::new(id, number)) {
            error!(job_id = %id, error = %e, "Failed to enqueue job");
            let failed = JobStatus::Failed(e.to_string()).encode();
            if let Err(store_err) = self.store.set(&id.store_key(), &failed).await {
                self.metrics.store_error();
                error!(job_id = %id, error = %store_err, "Failed to mark job as failed");
            }
            return Err(e.into());
        }

        self.metrics.job_submitted();
        info!(job_id = %id, number, "Job submitted");
        Ok(id)
    }

    /// Current stored status for `id`, verbatim. `None` if the id is unknown.
    pub async fn get_result(&self, id: JobId) -> Result<Option<String>, ServiceError> {
        self.store.get(&id.store_key()).await.map_err(|e| {
            self.metrics.store_error();
            error!(job_id = %id, error = %e, "Failed to read job status");
            e.into()
        })
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Draw ids until one is claimed with the placeholder
    async fn reserve_id(&self) -> Result<JobId, ServiceError> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();

            let claimed = self
                .store
                .set_if_absent(&id.store_key(), IN_PROGRESS)
                .await
                .map_err(|e| {
                    self.metrics.store_error();
                    error!(job_id = %id, error = %e, "Failed to store placeholder status");
                    e
                })?;

            if claimed {
                return Ok(id);
            }
            warn!(job_id = %id, attempt, "Job id already in use, drawing another");
        }

        Err(ServiceError::IdsExhausted(MAX_ID_ATTEMPTS))
    }
}
