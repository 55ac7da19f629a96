//! # Recycler
//!
//! The per-host decommission state machine. Each dispatch re-reads the
//! persisted detail, performs exactly one transition for its current step,
//! persists the result, and re-queues the same key unless the new state is
//! terminal. Polling loops are built from re-enqueueing, not from timers
//! held by workers.
//!
//! Every externally-backed step is a two-phase sub-protocol: *create* if
//! its job ref is empty (start the asynchronous job, record id/biz-id/link,
//! re-check after the poll delay), *poll* otherwise (running → delayed
//! re-check with no persisted change; success → advance and re-enqueue
//! immediately; failure → persist the paired failed status and stop).
//! Re-enqueueing a detail whose job ref is already set therefore never
//! creates a second external job for that step.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::Shutdown;
use crate::adapters::{
    BareMetalReimageApi, CloudInstanceApi, CloudOpState, CredentialService, InventoryService,
    OpsJobRunner, ReimageStatus, SoJobHost, SoJobRunner, SoJobState,
};
use crate::config::PoolConfig;
use crate::constants::{api, PING_UNREACHABLE};
use crate::error::{PoolError, Result};
use crate::models::{JobRef, OsType, RecallDetail, ResourceType};
use crate::queue::DedupQueue;
use crate::resilience::{retry_until, ApiRateLimiter, OpKind, Outcome};
use crate::state_machine::{step_for_failed, HostPhase, RecycleState, RecycleStep};
use crate::store::PoolStore;

/// Result of driving one step for one dispatch.
#[derive(Debug)]
enum StepOutcome {
    /// Step finished; move to the successor state and re-enqueue now.
    Advance,
    /// External job created this pass; re-check after the poll delay.
    Started,
    /// Job still running; re-check after the poll delay, nothing persisted.
    Pending,
    /// Step failed; persist the paired failed status and stop.
    Failed(String),
}

pub struct Recycler {
    store: Arc<dyn PoolStore>,
    inventory: Arc<dyn InventoryService>,
    ops_jobs: Arc<dyn OpsJobRunner>,
    so_jobs: Arc<dyn SoJobRunner>,
    cloud: Arc<dyn CloudInstanceApi>,
    reimage: Arc<dyn BareMetalReimageApi>,
    credentials: Arc<dyn CredentialService>,
    limits: Arc<ApiRateLimiter>,
    config: Arc<PoolConfig>,
    queue: Arc<DedupQueue<String>>,
}

impl Recycler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn PoolStore>,
        inventory: Arc<dyn InventoryService>,
        ops_jobs: Arc<dyn OpsJobRunner>,
        so_jobs: Arc<dyn SoJobRunner>,
        cloud: Arc<dyn CloudInstanceApi>,
        reimage: Arc<dyn BareMetalReimageApi>,
        credentials: Arc<dyn CredentialService>,
        limits: Arc<ApiRateLimiter>,
        config: Arc<PoolConfig>,
        queue: Arc<DedupQueue<String>>,
    ) -> Self {
        Self {
            store,
            inventory,
            ops_jobs,
            so_jobs,
            cloud,
            reimage,
            credentials,
            limits,
            config,
            queue,
        }
    }

    pub fn queue(&self) -> &Arc<DedupQueue<String>> {
        &self.queue
    }

    pub fn spawn_workers(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        (0..self.config.pipelines.recycler_workers)
            .map(|_| {
                let recycler = Arc::clone(self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let worker_id = Uuid::new_v4();
                    info!(%worker_id, "recycler worker started");
                    loop {
                        tokio::select! {
                            _ = shutdown.notified() => break,
                            key = recycler.queue.recv() => {
                                let Some(detail_id) = key else { break };
                                if let Err(e) = recycler.dispatch(detail_id.clone()).await {
                                    error!(%worker_id, detail_id, error = %e, "recycle dispatch failed");
                                }
                            }
                        }
                    }
                    info!(%worker_id, "recycler worker stopped");
                })
            })
            .collect()
    }

    /// Perform one transition for the detail's persisted state.
    pub async fn dispatch(&self, detail_id: String) -> Result<()> {
        let Some(mut detail) = self.store.get_detail(&detail_id).await? else {
            warn!(detail_id, "recycle key resolves no detail row");
            return Ok(());
        };
        if !detail.status.is_in_flight() {
            if detail.status.is_failed() {
                // Only the resume path enqueues failed rows; re-attempt
                // the failed step from its create phase.
                return self.resume_failed(detail).await;
            }
            return Ok(());
        }
        let Some(step) = RecycleStep::for_state(detail.status) else {
            return Ok(());
        };

        let outcome = match step {
            RecycleStep::PreCheck => self.pre_check(&mut detail).await?,
            RecycleStep::ClearCheck => self.clear_check(&mut detail).await?,
            RecycleStep::Reinstall => self.reinstall(&mut detail).await?,
            RecycleStep::Initialize | RecycleStep::DataDelete | RecycleStep::ConfCheck => {
                self.ops_template_step(&mut detail, step).await?
            }
            RecycleStep::Transit => self.transit(&mut detail).await?,
        };

        match outcome {
            StepOutcome::Advance => {
                let next = step.on_success();
                detail.status = next;
                detail.message.clear();
                self.store.update_detail(detail.clone()).await?;
                info!(detail_id = %detail.id, state = %next, "recycle step advanced");
                if next == RecycleState::Done {
                    self.finish_host(&detail).await?;
                } else {
                    // Immediate re-enqueue keeps pipeline latency low.
                    self.queue.enqueue(detail.id);
                }
            }
            StepOutcome::Started => {
                detail.status = step.running_state();
                self.store.update_detail(detail.clone()).await?;
                info!(detail_id = %detail.id, state = %detail.status, "external job started");
                self.queue
                    .enqueue_after(detail.id, self.config.poll_delay());
            }
            StepOutcome::Pending => {
                self.queue
                    .enqueue_after(detail_id, self.config.poll_delay());
            }
            StepOutcome::Failed(message) => {
                detail.status = step.on_failure();
                detail.message = message.clone();
                self.store.update_detail(detail.clone()).await?;
                warn!(detail_id = %detail.id, state = %detail.status, message, "recycle step failed");
                // No automatic re-enqueue; forward progress needs the
                // resume path or administrative Terminate.
            }
        }
        Ok(())
    }

    /// Reset a failed step so the next pass re-runs its create phase.
    async fn resume_failed(&self, mut detail: RecallDetail) -> Result<()> {
        let step = step_for_failed(detail.status)?;
        detail.clear_job_ref(step);
        detail.status = step.running_state();
        detail.message.clear();
        self.store.update_detail(detail.clone()).await?;
        info!(detail_id = %detail.id, state = %detail.status, "failed step reset for re-attempt");
        self.queue.enqueue(detail.id);
        Ok(())
    }

    /// Confirm the host actually sits in the pool's transit module and
    /// capture its authoritative IP/asset-id before any job touches it.
    async fn pre_check(&self, detail: &mut RecallDetail) -> Result<StepOutcome> {
        let ids = vec![detail.host_id.clone()];
        let hosts = match self
            .limited(api::INVENTORY, OpKind::Read, || {
                self.inventory.list_hosts(&ids)
            })
            .await
        {
            Ok(hosts) => hosts,
            Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
        };

        let Some(found) = hosts.into_iter().find(|h| h.host_id == detail.host_id) else {
            return Ok(StepOutcome::Failed(
                "host not found in inventory".to_string(),
            ));
        };
        let topology = &self.config.inventory;
        if found.biz != topology.pool_biz || found.module != topology.transit_module {
            return Ok(StepOutcome::Failed(format!(
                "host sits in biz {} module {}, not the pool transit module",
                found.biz, found.module
            )));
        }
        detail.labels.ip = found.ip;
        detail.labels.asset_id = found.asset_id;
        Ok(StepOutcome::Advance)
    }

    /// Verify the host is return-idle via the OS-appropriate job. A "ping
    /// death" per-host result is non-fatal: the host is presumed already
    /// powered off and the pipeline proceeds.
    async fn clear_check(&self, detail: &mut RecallDetail) -> Result<StepOutcome> {
        let (_, os) = self.policy_for(detail).await?;
        if !detail.clear_check.is_created() {
            let templates = &self.config.templates;
            let name = match os {
                OsType::Linux => templates.clear_check_job_linux.clone(),
                OsType::Windows | OsType::Other => templates.clear_check_job_windows.clone(),
            };
            let hosts = vec![SoJobHost {
                ip: detail.labels.ip.clone(),
                os,
            }];
            let job_id = match self
                .limited(api::SO_JOB, OpKind::Write, || {
                    self.so_jobs.create_job(&name, &hosts)
                })
                .await
            {
                Ok(id) => id,
                Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
            };
            detail.clear_check = JobRef::new(job_id.to_string(), String::new(), String::new());
            return Ok(StepOutcome::Started);
        }

        let Ok(job_id) = detail.clear_check.id.parse::<i64>() else {
            return Ok(StepOutcome::Failed(format!(
                "invalid clear-check job id {}",
                detail.clear_check.id
            )));
        };
        let status = match self
            .limited(api::SO_JOB, OpKind::Read, || {
                self.so_jobs.get_job_status(job_id)
            })
            .await
        {
            Ok(status) => status,
            Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
        };
        match status.state {
            SoJobState::Handling => Ok(StepOutcome::Pending),
            SoJobState::Success => Ok(StepOutcome::Advance),
            SoJobState::Failed => {
                let fatal = status
                    .hosts
                    .iter()
                    .find(|h| h.code != PING_UNREACHABLE);
                match fatal {
                    None if !status.hosts.is_empty() => {
                        info!(
                            detail_id = %detail.id,
                            "clear check reported ping death only; host presumed powered off"
                        );
                        Ok(StepOutcome::Advance)
                    }
                    Some(result) => Ok(StepOutcome::Failed(format!(
                        "clear check failed on {}: {} {}",
                        result.ip, result.code, result.message
                    ))),
                    None => Ok(StepOutcome::Failed("clear check job failed".to_string())),
                }
            }
        }
    }

    /// OS reinstallation, branched by resource type.
    async fn reinstall(&self, detail: &mut RecallDetail) -> Result<StepOutcome> {
        let (image_id, _) = self.policy_for(detail).await?;
        match detail.labels.resource_type {
            ResourceType::CloudInstance => self.reinstall_cloud(detail, &image_id).await,
            ResourceType::BareMetal => self.reinstall_bare_metal(detail, &image_id).await,
        }
    }

    async fn reinstall_cloud(
        &self,
        detail: &mut RecallDetail,
        image_id: &str,
    ) -> Result<StepOutcome> {
        if !detail.reinstall.is_created() {
            let password = match self
                .limited(api::CREDENTIAL, OpKind::Read, || {
                    self.credentials.get_pwd(&detail.labels.ip)
                })
                .await
            {
                Ok(pwd) => pwd,
                Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
            };
            let request_id = match self
                .limited(api::CLOUD, OpKind::Write, || {
                    self.cloud
                        .reset_instance(&detail.host_id, image_id, &password)
                })
                .await
            {
                Ok(id) => id,
                Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
            };
            detail.reinstall = JobRef::new(request_id, String::new(), String::new());
            return Ok(StepOutcome::Started);
        }

        let instance = match self
            .limited(api::CLOUD, OpKind::Read, || {
                self.cloud.describe_instance(&detail.host_id)
            })
            .await
        {
            Ok(instance) => instance,
            Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
        };
        if instance.latest_operation_request_id != detail.reinstall.id {
            // A concurrent operation's result must not be attributed to
            // our reset; keep polling until ours surfaces.
            return Ok(StepOutcome::Pending);
        }
        match instance.latest_operation_state {
            CloudOpState::Running => Ok(StepOutcome::Pending),
            CloudOpState::Success => Ok(StepOutcome::Advance),
            CloudOpState::Failed => Ok(StepOutcome::Failed(format!(
                "instance reset failed during {}",
                instance.latest_operation
            ))),
        }
    }

    async fn reinstall_bare_metal(
        &self,
        detail: &mut RecallDetail,
        image_id: &str,
    ) -> Result<StepOutcome> {
        if !detail.reinstall.is_created() {
            let password = match self
                .limited(api::CREDENTIAL, OpKind::Read, || {
                    self.credentials.get_pwd(&detail.labels.ip)
                })
                .await
            {
                Ok(pwd) => pwd,
                Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
            };
            let order_id = match self
                .limited(api::REIMAGE, OpKind::Write, || {
                    self.reimage
                        .create_reinstall_task(&detail.labels.asset_id, &password, image_id)
                })
                .await
            {
                Ok(id) => id,
                Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
            };
            detail.reinstall = JobRef::new(order_id, String::new(), String::new());
            return Ok(StepOutcome::Started);
        }

        let order_ids = vec![detail.reinstall.id.clone()];
        let orders = match self
            .limited(api::REIMAGE, OpKind::Read, || {
                self.reimage.get_reinstall_task_status(&order_ids)
            })
            .await
        {
            Ok(orders) => orders,
            Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
        };
        // Match by order id; other orders in the reply are not ours.
        match orders.into_iter().find(|o| o.order_id == detail.reinstall.id) {
            None => Ok(StepOutcome::Pending),
            Some(order) if order.status == ReimageStatus::Done => Ok(StepOutcome::Advance),
            Some(order) if order.status.is_terminal_failure() => Ok(StepOutcome::Failed(format!(
                "reimage order {} ended {:?}",
                order.order_id, order.status
            ))),
            Some(_) => Ok(StepOutcome::Pending),
        }
    }

    /// Template-backed step against the ops-job runner. Steps that do not
    /// apply to the host's OS record the zero job id and pass through.
    async fn ops_template_step(
        &self,
        detail: &mut RecallDetail,
        step: RecycleStep,
    ) -> Result<StepOutcome> {
        let (_, os) = self.policy_for(detail).await?;
        let current = detail
            .job_ref(step)
            .cloned()
            .unwrap_or_default();

        if !current.is_created() {
            let Some(template_id) = self.template_for(step, os) else {
                detail.set_job_ref(step, JobRef::skipped());
                return Ok(StepOutcome::Advance);
            };
            let biz_id = self.config.templates.ops_biz;
            let mut constants = HashMap::new();
            constants.insert("ip".to_string(), detail.labels.ip.clone());
            let job = match self
                .limited(api::OPS_JOB, OpKind::Write, || {
                    self.ops_jobs.create_task(template_id, biz_id, &constants)
                })
                .await
            {
                Ok(job) => job,
                Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
            };
            if let Err(e) = self
                .limited(api::OPS_JOB, OpKind::Write, || {
                    self.ops_jobs.start_task(job.task_id, biz_id)
                })
                .await
            {
                return Ok(StepOutcome::Failed(e.to_string()));
            }
            detail.set_job_ref(
                step,
                JobRef::new(job.task_id.to_string(), biz_id.to_string(), job.url),
            );
            return Ok(StepOutcome::Started);
        }

        if current.is_skipped() {
            return Ok(StepOutcome::Advance);
        }

        let (Ok(task_id), Ok(biz_id)) = (current.id.parse::<i64>(), current.biz_id.parse::<i64>())
        else {
            return Ok(StepOutcome::Failed(format!(
                "invalid ops job ref {}/{}",
                current.id, current.biz_id
            )));
        };
        let state = match self
            .limited(api::OPS_JOB, OpKind::Read, || {
                self.ops_jobs.get_task_status(task_id, biz_id)
            })
            .await
        {
            Ok(state) => state,
            Err(e) => return Ok(StepOutcome::Failed(e.to_string())),
        };
        if state.is_running() {
            Ok(StepOutcome::Pending)
        } else if state == crate::adapters::OpsTaskState::Finished {
            Ok(StepOutcome::Advance)
        } else {
            Ok(StepOutcome::Failed(format!(
                "ops job {task_id} ended {state:?}"
            )))
        }
    }

    /// Move the inventory record from the transit module back to the pool
    /// module. From here the host is visible to future launch cycles.
    async fn transit(&self, detail: &mut RecallDetail) -> Result<StepOutcome> {
        let topology = &self.config.inventory;
        let ids = vec![detail.host_id.clone()];
        match self
            .limited(api::INVENTORY, OpKind::Write, || {
                self.inventory.transfer_hosts(
                    topology.pool_biz,
                    &ids,
                    topology.pool_biz,
                    topology.idle_module,
                )
            })
            .await
        {
            Ok(()) => Ok(StepOutcome::Advance),
            Err(e) => Ok(StepOutcome::Failed(e.to_string())),
        }
    }

    /// Flip the pool-host phase once its pipeline reaches Done.
    async fn finish_host(&self, detail: &RecallDetail) -> Result<()> {
        let Some(mut host) = self.store.get_host(&detail.host_id).await? else {
            warn!(detail_id = %detail.id, host_id = %detail.host_id, "done detail has no pool host row");
            return Ok(());
        };
        if host.status.phase.may_advance_to(HostPhase::Recalled) {
            host.status.phase = HostPhase::Recalled;
            self.store.update_host(host).await?;
        }
        info!(detail_id = %detail.id, host_id = %detail.host_id, "host recycled");
        Ok(())
    }

    /// Target image and OS from the owning recall order's policy, else the
    /// configured fallback.
    async fn policy_for(&self, detail: &RecallDetail) -> Result<(String, OsType)> {
        let order = self.store.get_recall_order_for_task(detail.task_id).await?;
        Ok(match order.and_then(|o| o.policy) {
            Some(policy) => (policy.image_id, policy.os_type),
            None => (
                self.config.recycle.default_image_id.clone(),
                self.config.recycle.default_os,
            ),
        })
    }

    fn template_for(&self, step: RecycleStep, os: OsType) -> Option<i64> {
        let templates = &self.config.templates;
        match (step, os) {
            (RecycleStep::Initialize, OsType::Linux) => Some(templates.initialize_linux),
            (RecycleStep::Initialize, OsType::Windows) => Some(templates.initialize_windows),
            // Data delete and conf check run on Linux only.
            (RecycleStep::DataDelete, OsType::Linux) => Some(templates.data_delete_linux),
            (RecycleStep::ConfCheck, OsType::Linux) => Some(templates.conf_check_linux),
            _ => None,
        }
    }

    /// Wrap an adapter call in the shared limiter and the bounded retry
    /// driver. Limiter rejection is a retryable outcome, never a drop;
    /// exhaustion converts to an ordinary adapter error.
    async fn limited<T, F, Fut>(&self, api: &str, kind: OpKind, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_until(
            api,
            self.config.retry_timeout(),
            self.config.retry_interval(),
            || async {
                if !self.limits.try_acquire(api, kind) {
                    return Outcome::Retry;
                }
                Outcome::from_result(f().await)
            },
        )
        .await
        .map_err(|e| match e {
            PoolError::Exhausted(name) => PoolError::adapter(name, "retry budget exhausted"),
            other => other,
        })
    }
}
