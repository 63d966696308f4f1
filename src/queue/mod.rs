//! Job intake: identifiers, the FIFO queue, and the dispatch loop
//!
//! ```text
//! submit ──► JobQueue ──► JobReceiver ──► Dispatcher ──► WorkerPool
//!  (many producers)        (one consumer)
//! ```

pub mod channel;
pub mod dispatcher;
pub mod job;

pub use channel::{JobQueue, JobReceiver, QueueError};
pub use dispatcher::Dispatcher;
pub use job::{Job, JobId, JobIdSource, MAX_JOB_ID, RandomIdSource};
