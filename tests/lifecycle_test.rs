//! End-to-end job lifecycle without the HTTP layer

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use factorbox::factor::{FactorError, Factorizer, TrialDivision};
use factorbox::observability::Metrics;
use factorbox::queue::{Dispatcher, JobId, JobQueue, RandomIdSource};
use factorbox::service::FactorService;
use factorbox::status::{JobStatus, MemoryStatusStore, StatusStore};
use factorbox::worker::WorkerPool;

/// Trial division that records how many calls overlap
struct Tracking {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Tracking {
    fn new() -> Self {
        Self {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl Factorizer for Tracking {
    fn factor(&self, n: i64) -> Result<Vec<u64>, FactorError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        let result = TrialDivision.factor(n);
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

struct Harness {
    service: Arc<FactorService>,
    store: Arc<MemoryStatusStore>,
    metrics: Arc<Metrics>,
}

fn start(capacity: usize, factorizer: Arc<dyn Factorizer>) -> Harness {
    let store = Arc::new(MemoryStatusStore::new());
    let metrics = Arc::new(Metrics::new());

    let pool = WorkerPool::new(capacity, store.clone(), factorizer, metrics.clone()).unwrap();
    let (queue, receiver) = JobQueue::new();
    Dispatcher::new(receiver, pool).spawn();

    let service = FactorService::new(
        queue,
        store.clone(),
        Arc::new(RandomIdSource::default()),
        metrics.clone(),
    );

    Harness {
        service: Arc::new(service),
        store,
        metrics,
    }
}

async fn wait_done(service: &FactorService, id: JobId) -> String {
    for _ in 0..500 {
        let value = service.get_result(id).await.unwrap().unwrap();
        if JobStatus::parse(&value) != Some(JobStatus::InProgress) {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never completed");
}

#[tokio::test]
async fn test_placeholder_then_result() {
    let harness = start(2, Arc::new(TrialDivision));

    let id = harness.service.submit(12).await.unwrap();
    let first = harness.service.get_result(id).await.unwrap().unwrap();
    assert!(first == "Calculating..." || first == "2,2,3", "{first}");

    assert_eq!(wait_done(&harness.service, id).await, "2,2,3");
}

#[tokio::test]
async fn test_unknown_id() {
    let harness = start(1, Arc::new(TrialDivision));
    assert_eq!(harness.service.get_result(JobId(u64::MAX)).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_beyond_capacity() {
    const CAPACITY: usize = 3;
    const JOBS: i64 = 40;

    let tracking = Arc::new(Tracking::new());
    let harness = start(CAPACITY, tracking.clone());

    let mut handles = Vec::new();
    for n in 2..2 + JOBS {
        let service = harness.service.clone();
        handles.push(tokio::spawn(async move {
            let id = service.submit(n * 7).await.unwrap();
            (id, n * 7)
        }));
    }

    let mut submitted = Vec::new();
    for handle in handles {
        submitted.push(handle.await.unwrap());
    }

    let unique: HashSet<JobId> = submitted.iter().map(|(id, _)| *id).collect();
    assert_eq!(unique.len(), submitted.len());

    for (id, number) in &submitted {
        let value = wait_done(&harness.service, *id).await;
        let Some(JobStatus::Done(factors)) = JobStatus::parse(&value) else {
            panic!("job {id} ended as {value}");
        };
        assert_eq!(factors.iter().product::<u64>(), *number as u64);
        assert!(factors.windows(2).all(|w| w[0] <= w[1]));
    }

    assert!(tracking.peak.load(Ordering::SeqCst) <= CAPACITY);
    assert_eq!(harness.store.len().await, JOBS as usize);

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.jobs_submitted, JOBS as u64);
    assert_eq!(snapshot.jobs_completed, JOBS as u64);
    assert_eq!(snapshot.jobs_failed, 0);
}
