//! # Recaller
//!
//! Return-intake pipeline: selects idle hosts matching a recall task's
//! selector list, moves them into the transit module, and emits one
//! decommission detail per host into the Recycler. Task-level success
//! means "all matched hosts handed off", not "all hosts fully recycled";
//! the per-host pipelines keep running after the task flips to Success.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::Shutdown;
use crate::adapters::InventoryService;
use crate::config::PoolConfig;
use crate::constants::{api, collections};
use crate::error::{PoolError, Result};
use crate::models::{OpPhase, OpRecord, OpType, PoolHost, RecallDetail};
use crate::queue::DedupQueue;
use crate::resilience::{retry_until, ApiRateLimiter, OpKind, Outcome};
use crate::state_machine::HostPhase;
use crate::store::{HostQuery, Page, PoolStore};

pub struct Recaller {
    store: Arc<dyn PoolStore>,
    inventory: Arc<dyn InventoryService>,
    limits: Arc<ApiRateLimiter>,
    config: Arc<PoolConfig>,
    queue: Arc<DedupQueue<i64>>,
    recycler_queue: Arc<DedupQueue<String>>,
}

impl Recaller {
    pub fn new(
        store: Arc<dyn PoolStore>,
        inventory: Arc<dyn InventoryService>,
        limits: Arc<ApiRateLimiter>,
        config: Arc<PoolConfig>,
        queue: Arc<DedupQueue<i64>>,
        recycler_queue: Arc<DedupQueue<String>>,
    ) -> Self {
        Self {
            store,
            inventory,
            limits,
            config,
            queue,
            recycler_queue,
        }
    }

    pub fn queue(&self) -> &Arc<DedupQueue<i64>> {
        &self.queue
    }

    pub fn spawn_workers(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        (0..self.config.pipelines.recaller_workers)
            .map(|_| {
                let recaller = Arc::clone(self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let worker_id = Uuid::new_v4();
                    info!(%worker_id, "recaller worker started");
                    loop {
                        tokio::select! {
                            _ = shutdown.notified() => break,
                            key = recaller.queue.recv() => {
                                let Some(task_id) = key else { break };
                                if let Err(e) = recaller.dispatch(task_id).await {
                                    error!(%worker_id, task_id, error = %e, "recall dispatch failed");
                                }
                            }
                        }
                    }
                    info!(%worker_id, "recaller worker stopped");
                })
            })
            .collect()
    }

    /// Hand off up to `pending` matching idle hosts for this task.
    pub async fn dispatch(&self, task_id: i64) -> Result<()> {
        let Some(mut task) = self.store.get_recall_task(task_id).await? else {
            return Err(PoolError::Validation(format!(
                "recall task {task_id} does not exist"
            )));
        };
        if task.status.phase.is_terminal() {
            return Ok(());
        }

        let pending = task.status.pending;
        if pending == 0 {
            return Ok(());
        }

        let query = HostQuery::default()
            .with_phase(HostPhase::Idle)
            .with_selectors(task.selectors.clone());
        let hosts = self
            .store
            .find_hosts(&query, Page::first(pending as usize))
            .await?;

        if hosts.is_empty() {
            // Nothing matched yet; stay Running and poll again once more
            // idle hosts of this grade may have appeared.
            task.status.mark_running();
            self.store.update_recall_task(task).await?;
            self.queue
                .enqueue_after(task_id, self.config.poll_delay());
            info!(task_id, "no idle hosts match recall selectors");
            return Ok(());
        }

        let mut handed_off: u32 = 0;
        for host in hosts {
            match self.hand_off(&task.operator, task_id, host).await {
                Ok(detail_id) => {
                    handed_off += 1;
                    self.recycler_queue.enqueue(detail_id);
                }
                Err(e) => {
                    // Sibling hosts are unaffected by one failed hand-off.
                    warn!(task_id, error = %e, "host hand-off failed");
                }
            }
        }

        if handed_off > 0 {
            task.status.record_success(handed_off);
        } else {
            task.status.mark_running();
        }
        let phase = task.status.phase;
        self.store.update_recall_task(task).await?;
        if !phase.is_terminal() {
            // Partial fill keeps the task alive; the remainder is matched
            // on a later poll.
            self.queue
                .enqueue_after(task_id, self.config.poll_delay());
        }
        info!(task_id, handed_off, %phase, "recall dispatch finished");
        Ok(())
    }

    /// Transfer one host to transit, persist its hand-off, and create the
    /// decommission detail. The audit record is created at phase Success:
    /// the host-level hand-off itself completed, independent of the
    /// multi-step recycle pipeline that follows.
    async fn hand_off(&self, operator: &str, task_id: i64, mut host: PoolHost) -> Result<String> {
        let topology = &self.config.inventory;
        let host_ids = vec![host.host_id.clone()];
        self.transfer(
            topology.pool_biz,
            &host_ids,
            topology.pool_biz,
            topology.transit_module,
        )
        .await?;

        host.status.phase = HostPhase::ForRecall;
        host.status.recall_task = Some(task_id);
        host.status.recalled_at = Some(chrono::Utc::now());
        let host_id = host.host_id.clone();
        let labels = host.labels.clone();
        self.store.update_host(host).await?;

        let record_id = self.store.next_id(collections::OP_RECORD).await?;
        let record = OpRecord::new(
            record_id,
            host_id.clone(),
            labels.clone(),
            OpType::Recall,
            task_id,
            OpPhase::Success,
            operator.to_string(),
        );
        self.store.insert_op_record(record).await?;

        let detail = RecallDetail::new(task_id, host_id, labels, operator.to_string());
        let detail_id = detail.id.clone();
        self.store.insert_detail(detail).await?;
        Ok(detail_id)
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
