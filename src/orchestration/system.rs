//! # System Wiring
//!
//! Constructs the process-wide singletons once at service start: the
//! shared rate limiter, the three pipeline queues, the worker pools, and
//! the façade that feeds them. Shutdown is cooperative; workers drain
//! their current dispatch before exiting.

use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use super::{Launcher, PoolFacade, Recaller, Recycler, Shutdown};
use crate::adapters::{
    BareMetalReimageApi, CloudInstanceApi, CredentialService, InventoryService, OpsJobRunner,
    SoJobRunner,
};
use crate::config::PoolConfig;
use crate::queue::DedupQueue;
use crate::resilience::ApiRateLimiter;
use crate::store::PoolStore;

/// The external automation services the pipelines call out to.
#[derive(Clone)]
pub struct Adapters {
    pub inventory: Arc<dyn InventoryService>,
    pub ops_jobs: Arc<dyn OpsJobRunner>,
    pub so_jobs: Arc<dyn SoJobRunner>,
    pub cloud: Arc<dyn CloudInstanceApi>,
    pub reimage: Arc<dyn BareMetalReimageApi>,
    pub credentials: Arc<dyn CredentialService>,
}

/// Fully wired orchestrator: façade plus the three worker pipelines.
pub struct PoolSystem {
    facade: Arc<PoolFacade>,
    launcher: Arc<Launcher>,
    recaller: Arc<Recaller>,
    recycler: Arc<Recycler>,
    shutdown: Shutdown,
    workers: Vec<JoinHandle<()>>,
}

impl PoolSystem {
    pub fn new(config: PoolConfig, store: Arc<dyn PoolStore>, adapters: Adapters) -> Self {
        let config = Arc::new(config);
        let limits = Arc::new(ApiRateLimiter::new(
            config.limits.apis.clone(),
            config.limits.fallback,
        ));

        let budget = config.pipelines.queue_budget;
        let launcher_queue = Arc::new(DedupQueue::<i64>::rate_limited(budget));
        let recaller_queue = Arc::new(DedupQueue::<i64>::rate_limited(budget));
        let recycler_queue = Arc::new(DedupQueue::<String>::rate_limited(budget));

        let launcher = Arc::new(Launcher::new(
            Arc::clone(&store),
            Arc::clone(&adapters.inventory),
            Arc::clone(&limits),
            Arc::clone(&config),
            Arc::clone(&launcher_queue),
        ));
        let recaller = Arc::new(Recaller::new(
            Arc::clone(&store),
            Arc::clone(&adapters.inventory),
            Arc::clone(&limits),
            Arc::clone(&config),
            Arc::clone(&recaller_queue),
            Arc::clone(&recycler_queue),
        ));
        let recycler = Arc::new(Recycler::new(
            Arc::clone(&store),
            Arc::clone(&adapters.inventory),
            Arc::clone(&adapters.ops_jobs),
            Arc::clone(&adapters.so_jobs),
            Arc::clone(&adapters.cloud),
            Arc::clone(&adapters.reimage),
            Arc::clone(&adapters.credentials),
            Arc::clone(&limits),
            Arc::clone(&config),
            Arc::clone(&recycler_queue),
        ));
        let facade = Arc::new(PoolFacade::new(
            store,
            adapters.inventory,
            limits,
            config,
            launcher_queue,
            recaller_queue,
            recycler_queue,
        ));

        Self {
            facade,
            launcher,
            recaller,
            recycler,
            shutdown: Shutdown::new(),
            workers: Vec::new(),
        }
    }

    pub fn facade(&self) -> Arc<PoolFacade> {
        Arc::clone(&self.facade)
    }

    /// Spawn every worker pool. Idempotent start is not supported; call
    /// once after construction.
    pub fn start(&mut self) {
        let mut workers = Vec::new();
        workers.extend(self.launcher.spawn_workers(&self.shutdown));
        workers.extend(self.recaller.spawn_workers(&self.shutdown));
        workers.extend(self.recycler.spawn_workers(&self.shutdown));
        info!(worker_count = workers.len(), "pool system started");
        self.workers = workers;
    }

    /// Signal every worker, close the queues, and wait for the pools to
    /// drain their current dispatch.
    pub async fn shutdown(&mut self) {
        self.shutdown.trigger();
        self.launcher.queue().close();
        self.recaller.queue().close();
        self.recycler.queue().close();
        join_all(self.workers.drain(..)).await;
        info!("pool system stopped");
    }
}
