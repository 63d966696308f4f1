use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::job::Job;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue closed, job {0} not accepted")]
    Closed(super::job::JobId),
}

/// Producer side of the job queue
///
/// Unbounded FIFO: `enqueue` never waits. Cloning gives another producer
/// handle on the same queue; jobs from one handle keep their order.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
    depth: Arc<AtomicUsize>,
}

/// Consumer side of the job queue. There is exactly one.
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<Job>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Create a queue, returning the producer handle and the single consumer
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));

        let queue = Self {
            sender,
            depth: depth.clone(),
        };

        (queue, JobReceiver { receiver, depth })
    }

    /// Append a job. Fails only once the consumer is gone.
    pub fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let id = job.id;
        self.depth.fetch_add(1, Ordering::SeqCst);

        if self.sender.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed(id));
        }

        debug!(job_id = %id, "Job enqueued");
        Ok(())
    }

    /// Jobs enqueued but not yet taken by the consumer
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl JobReceiver {
    /// Wait for the next job.
    ///
    /// Returns `None` after every [`JobQueue`] handle has been dropped and
    /// the remaining jobs have been drained.
    pub async fn dequeue(&mut self) -> Option<Job> {
        let job = self.receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(job)
    }
}
