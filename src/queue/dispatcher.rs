use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::channel::JobReceiver;
use crate::worker::WorkerPool;

/// Single loop moving jobs from the queue into the worker pool.
///
/// It never runs job logic and never waits for a job to finish; the only
/// time it waits on the pool is while every slot is busy.
pub struct Dispatcher {
    receiver: JobReceiver,
    pool: WorkerPool,
}

impl Dispatcher {
    pub fn new(receiver: JobReceiver, pool: WorkerPool) -> Self {
        Self { receiver, pool }
    }

    /// Run until the queue is closed and drained.
    ///
    /// A failed hand-off is logged and the job is marked failed; the loop
    /// keeps going.
    pub async fn run(mut self) {
        info!(capacity = self.pool.capacity(), "Dispatcher started");

        while let Some(job) = self.receiver.dequeue().await {
            let id = job.id;
            debug!(job_id = %id, "Dispatching job");

            if let Err(e) = self.pool.execute(job).await {
                error!(job_id = %id, error = %e, "Failed to hand job to worker pool");
                self.pool.reject(id, &e.to_string()).await;
            }
        }

        info!("Job queue closed, dispatcher stopping");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::TrialDivision;
    use crate::observability::Metrics;
    use crate::queue::{Job, JobId, JobQueue};
    use crate::status::{MemoryStatusStore, StatusStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(capacity: usize) -> (JobQueue, Dispatcher, WorkerPool, Arc<MemoryStatusStore>) {
        let store = Arc::new(MemoryStatusStore::new());
        let pool = WorkerPool::new(
            capacity,
            store.clone(),
            Arc::new(TrialDivision),
            Arc::new(Metrics::new()),
        )
        .unwrap();
        let (queue, receiver) = JobQueue::new();
        let dispatcher = Dispatcher::new(receiver, pool.clone());
        (queue, dispatcher, pool, store)
    }

    async fn wait_for_len(store: &MemoryStatusStore, expected: usize) {
        for _ in 0..300 {
            if store.len().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} statuses, found {}", store.len().await);
    }

    #[tokio::test]
    async fn test_dispatches_all_jobs() {
        let (queue, dispatcher, _pool, store) = setup(2);
        let handle = dispatcher.spawn();

        for i in 0..10u64 {
            queue.enqueue(Job::new(JobId(i), (i + 2) as i64)).unwrap();
        }

        wait_for_len(&store, 10).await;
        assert_eq!(store.get("0").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.get("2").await.unwrap().as_deref(), Some("2,2"));
        assert_eq!(store.get("10").await.unwrap(), None);

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_survives_closed_pool() {
        let (queue, dispatcher, pool, store) = setup(1);
        let handle = dispatcher.spawn();

        pool.close();
        queue.enqueue(Job::new(JobId(1), 12)).unwrap();
        queue.enqueue(Job::new(JobId(2), 12)).unwrap();

        wait_for_len(&store, 2).await;
        let status = store.get("2").await.unwrap().unwrap();
        assert!(status.starts_with("Failed: "), "{status}");

        // still consuming
        assert!(!handle.is_finished());
        drop(queue);
        handle.await.unwrap();
    }
}
