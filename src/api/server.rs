use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info, warn};

use super::{
    services::{get_result, health, hello, stats, submit_factor},
    state::AppState,
};
use crate::config::Config;
use crate::factor::TrialDivision;
use crate::observability::Metrics;
use crate::queue::{Dispatcher, JobQueue, RandomIdSource};
use crate::service::FactorService;
use crate::status::{self, StatusStore};
use crate::worker::WorkerPool;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How long shutdown waits for queued jobs to be failed and running ones to finish
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Wire the store, queue, pool and dispatcher together.
///
/// Fails if the status store cannot be reached. The returned handle is the
/// running dispatcher; it ends once every [`AppState`] clone is dropped.
pub async fn build_state(config: Config) -> Result<(AppState, JoinHandle<()>), AnyError> {
    let store = status::connect(&config.store)
        .await
        .map_err(|e| format!("Failed to connect status store: {}", e))?;

    build_state_with_store(config, store)
}

/// Like [`build_state`], over an already connected store
pub fn build_state_with_store(
    config: Config,
    store: Arc<dyn StatusStore>,
) -> Result<(AppState, JoinHandle<()>), AnyError> {
    let metrics = Arc::new(Metrics::new());

    let pool = WorkerPool::new(
        config.workers.num_workers,
        store.clone(),
        Arc::new(TrialDivision),
        metrics.clone(),
    )?;

    let (queue, receiver) = JobQueue::new();
    let dispatcher = Dispatcher::new(receiver, pool.clone()).spawn();

    let service = FactorService::new(
        queue,
        store,
        Arc::new(RandomIdSource::default()),
        metrics.clone(),
    );

    let state = AppState::new(config, service, pool, metrics, dispatcher.abort_handle());
    Ok((state, dispatcher))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/factor", post(submit_factor))
        .route("/get/{task_id}", get(get_result))
        .route("/health", get(health))
        .route("/operators/stats", get(stats))
        .with_state(state)
        // gzip request bodies are inflated before handlers see them
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(address: Option<SocketAddr>, config_path: Option<PathBuf>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config =
        Config::load_with_file(config_path).map_err(|e| format!("Failed to load config: {}", e))?;

    let address = address.unwrap_or(config.server.bind_addr);
    info!(
        backend = ?config.store.backend,
        workers = config.workers.num_workers,
        "Starting factorbox"
    );

    let (state, dispatcher) = build_state(config).await?;
    let pool = state.pool.clone();
    let store = state.service.store().clone();
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "factorbox API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // the router and its queue handles are gone now
    shutdown(pool, dispatcher, store).await;

    info!("Shutdown complete");
    Ok(())
}

/// Stop the job pipeline once every queue producer has been dropped.
///
/// Jobs still queued are marked failed by the dispatcher against the closed
/// pool; running jobs get until the grace period ends to publish.
pub(crate) async fn shutdown(
    pool: WorkerPool,
    dispatcher: JoinHandle<()>,
    store: Arc<dyn StatusStore>,
) {
    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    pool.close();

    match tokio::time::timeout_at(deadline, dispatcher).await {
        Ok(Ok(())) => info!("Job queue drained"),
        Ok(Err(e)) => error!(error = %e, "Dispatcher task failed"),
        Err(_) => warn!("Job queue not drained before shutdown deadline"),
    }

    while pool.stats().busy > 0 {
        if tokio::time::Instant::now() >= deadline {
            warn!(busy = pool.stats().busy, "Abandoning running jobs");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    if let Err(e) = store.flush().await {
        error!(backend = store.backend(), error = %e, "Failed to flush status store");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::{FactorError, Factorizer};
    use crate::status::MemoryStatusStore;
    use std::sync::Barrier;

    /// Blocks on the barrier when asked to factor 4
    struct Gated(Arc<Barrier>);

    impl Factorizer for Gated {
        fn factor(&self, n: i64) -> Result<Vec<u64>, FactorError> {
            if n == 4 {
                self.0.wait();
            }
            TrialDivision.factor(n)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_fails_queued_jobs_and_finishes_running_ones() {
        let store = Arc::new(MemoryStatusStore::new());
        let metrics = Arc::new(Metrics::new());
        let gate = Arc::new(Barrier::new(2));

        let pool = WorkerPool::new(
            1,
            store.clone(),
            Arc::new(Gated(gate.clone())),
            metrics.clone(),
        )
        .unwrap();
        let (queue, receiver) = JobQueue::new();
        let dispatcher = Dispatcher::new(receiver, pool.clone()).spawn();
        let service = FactorService::new(
            queue,
            store.clone(),
            Arc::new(RandomIdSource::default()),
            metrics,
        );

        let running = service.submit(4).await.unwrap();
        while pool.stats().busy == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let queued = [
            service.submit(12).await.unwrap(),
            service.submit(30).await.unwrap(),
        ];
        drop(service);

        let release = tokio::task::spawn_blocking(move || {
            std::thread::sleep(Duration::from_millis(50));
            gate.wait();
        });
        shutdown(pool, dispatcher, store.clone()).await;
        release.await.unwrap();

        assert_eq!(
            store.get(&running.store_key()).await.unwrap().as_deref(),
            Some("2,2")
        );
        for id in queued {
            let status = store.get(&id.store_key()).await.unwrap().unwrap();
            assert!(status.starts_with("Failed: "), "{status}");
        }
    }
}
