use std::sync::Arc;

use tokio::task::AbortHandle;

use crate::config::Config;
use crate::observability::Metrics;
use crate::service::FactorService;
use crate::worker::WorkerPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<FactorService>,
    pub pool: WorkerPool,
    pub metrics: Arc<Metrics>,
    /// Handle on the dispatcher task, used to report its liveness
    pub dispatcher: AbortHandle,
}

impl AppState {
    pub fn new(
        config: Config,
        service: FactorService,
        pool: WorkerPool,
        metrics: Arc<Metrics>,
        dispatcher: AbortHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            pool,
            metrics,
            dispatcher,
        }
    }

    pub fn dispatcher_alive(&self) -> bool {
        !self.dispatcher.is_finished()
    }
}
