//! # Launcher
//!
//! Onboarding pipeline: moves newly-acquired hosts into the pool's idle
//! module in one batch inventory transfer and creates one pool-host row
//! per audit record. A fixed-size worker pool drains a queue of launch
//! task ids; dispatch failures leave the task for external re-enqueue,
//! there is no automatic retry.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::Shutdown;
use crate::adapters::InventoryService;
use crate::config::PoolConfig;
use crate::constants::api;
use crate::error::{PoolError, Result};
use crate::models::{OpPhase, OpType, PoolHost};
use crate::queue::DedupQueue;
use crate::resilience::{retry_until, ApiRateLimiter, OpKind, Outcome};
use crate::store::PoolStore;

pub struct Launcher {
    store: Arc<dyn PoolStore>,
    inventory: Arc<dyn InventoryService>,
    limits: Arc<ApiRateLimiter>,
    config: Arc<PoolConfig>,
    queue: Arc<DedupQueue<i64>>,
}

impl Launcher {
    pub fn new(
        store: Arc<dyn PoolStore>,
        inventory: Arc<dyn InventoryService>,
        limits: Arc<ApiRateLimiter>,
        config: Arc<PoolConfig>,
        queue: Arc<DedupQueue<i64>>,
    ) -> Self {
        Self {
            store,
            inventory,
            limits,
            config,
            queue,
        }
    }

    pub fn queue(&self) -> &Arc<DedupQueue<i64>> {
        &self.queue
    }

    /// Spawn the fixed worker pool. Loops exit on shutdown or when the
    /// queue is closed and drained.
    pub fn spawn_workers(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        (0..self.config.pipelines.launcher_workers)
            .map(|_| {
                let launcher = Arc::clone(self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let worker_id = Uuid::new_v4();
                    info!(%worker_id, "launcher worker started");
                    loop {
                        tokio::select! {
                            _ = shutdown.notified() => break,
                            key = launcher.queue.recv() => {
                                let Some(task_id) = key else { break };
                                if let Err(e) = launcher.dispatch(task_id).await {
                                    error!(%worker_id, task_id, error = %e, "launch dispatch failed");
                                }
                            }
                        }
                    }
                    info!(%worker_id, "launcher worker stopped");
                })
            })
            .collect()
    }

    /// Process one launch task end to end.
    ///
    /// The batch inventory transfer is issued first and is not rolled back
    /// if a later per-host upsert fails; such hosts are physically moved
    /// without a matching pool-host row until external reconciliation.
    pub async fn dispatch(&self, task_id: i64) -> Result<()> {
        let Some(mut task) = self.store.get_launch_task(task_id).await? else {
            return Err(PoolError::Validation(format!(
                "launch task {task_id} does not exist"
            )));
        };
        if task.status.phase.is_terminal() {
            return Ok(());
        }

        let records = self.store.list_op_records(OpType::Launch, task_id).await?;
        let host_ids: Vec<String> = records.iter().map(|r| r.host_id.clone()).collect();
        if host_ids.is_empty() {
            return Err(PoolError::Validation(format!(
                "launch task {task_id} resolves no hosts"
            )));
        }

        // One batch transfer into the pool's idle module.
        let topology = &self.config.inventory;
        if let Err(e) = self
            .transfer(
                topology.resource_biz,
                &host_ids,
                topology.pool_biz,
                topology.idle_module,
            )
            .await
        {
            warn!(task_id, error = %e, "launch inventory transfer failed");
            task.status.record_failure(host_ids.len() as u32, e.to_string());
            self.store.update_launch_task(task).await?;
            return Err(e);
        }

        for record in &records {
            let host = PoolHost::launched(record.host_id.clone(), record.labels.clone(), task_id);
            self.store.upsert_host(host).await?;
        }

        let count = records.len() as u32;
        self.store
            .update_op_records_phase(OpType::Launch, task_id, OpPhase::Success, "")
            .await?;
        task.status.record_success(count);
        self.store.update_launch_task(task).await?;
        info!(task_id, hosts = count, "launch task completed");
        Ok(())
    }

    async fn transfer(
        &self,
        from_biz: i64,
        host_ids: &[String],
        to_biz: i64,
        to_module: i64,
    ) -> Result<()> {
        let timeout = self.config.retry_timeout();
        let interval = self.config.retry_interval();
        retry_until(api::INVENTORY, timeout, interval, || async {
            if !self.limits.try_acquire(api::INVENTORY, OpKind::Write) {
                return Outcome::Retry;
            }
            Outcome::from_result(
                self.inventory
                    .transfer_hosts(from_biz, host_ids, to_biz, to_module)
                    .await,
            )
        })
        .await
        .map_err(|e| match e {
            PoolError::Exhausted(name) => PoolError::adapter(name, "retry budget exhausted"),
            other => other,
        })
    }
}
