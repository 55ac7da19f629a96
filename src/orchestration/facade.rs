//! # Pool Façade
//!
//! Orchestration entry point for the API layer: validates client intent,
//! turns it into durable task rows, and hands the ids to the worker
//! queues. Every error surfaces synchronously; the workers own everything
//! that happens after enqueue.

use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::InventoryService;
use crate::config::PoolConfig;
use crate::constants::{api, collections};
use crate::error::{PoolError, Result};
use crate::models::{
    GradeCfg, HostLabels, LabelKey, LaunchTask, OpPhase, OpRecord, OpType, PoolHost, RecallDetail,
    RecallOrder, RecallSpec, RecallTask, Selector, TaskPhase,
};
use crate::queue::DedupQueue;
use crate::resilience::{retry_until, ApiRateLimiter, OpKind, Outcome};
use crate::state_machine::HostPhase;
use crate::store::{Page, PoolStore};

/// Paged list reply: total row count plus the requested window. In
/// count-only mode `info` is left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    pub count: u64,
    pub info: Vec<RecallDetail>,
}

pub struct PoolFacade {
    store: Arc<dyn PoolStore>,
    inventory: Arc<dyn InventoryService>,
    limits: Arc<ApiRateLimiter>,
    config: Arc<PoolConfig>,
    grades: GradeCfg,
    launcher_queue: Arc<DedupQueue<i64>>,
    recaller_queue: Arc<DedupQueue<i64>>,
    recycler_queue: Arc<DedupQueue<String>>,
}

impl PoolFacade {
    pub fn new(
        store: Arc<dyn PoolStore>,
        inventory: Arc<dyn InventoryService>,
        limits: Arc<ApiRateLimiter>,
        config: Arc<PoolConfig>,
        launcher_queue: Arc<DedupQueue<i64>>,
        recaller_queue: Arc<DedupQueue<i64>>,
        recycler_queue: Arc<DedupQueue<String>>,
    ) -> Self {
        let grades = config.grade_cfg();
        Self {
            store,
            inventory,
            limits,
            config,
            grades,
            launcher_queue,
            recaller_queue,
            recycler_queue,
        }
    }

    /// Create a launch task for a batch of newly-acquired hosts.
    ///
    /// Hosts whose inventory metadata or device-type classification does
    /// not resolve are skipped with a warning; the call fails only when no
    /// host resolves at all.
    pub async fn create_launch_task(
        &self,
        operator: &str,
        host_ids: Vec<String>,
    ) -> Result<i64> {
        if host_ids.is_empty() {
            return Err(PoolError::Validation("host id list is empty".to_string()));
        }

        let inventory_hosts = retry_until(
            api::INVENTORY,
            self.config.retry_timeout(),
            self.config.retry_interval(),
            || async {
                if !self.limits.try_acquire(api::INVENTORY, OpKind::Read) {
                    return Outcome::Retry;
                }
                Outcome::from_result(self.inventory.list_hosts(&host_ids).await)
            },
        )
        .await
        .map_err(|e| match e {
            PoolError::Exhausted(name) => PoolError::adapter(name, "retry budget exhausted"),
            other => other,
        })?;

        let mut resolved: Vec<(String, HostLabels)> = Vec::new();
        for host_id in &host_ids {
            let Some(found) = inventory_hosts.iter().find(|h| h.host_id == *host_id) else {
                warn!(host_id, "host missing from inventory, skipped");
                continue;
            };
            let Some(grade) = self.grades.lookup(&found.device_type) else {
                warn!(host_id, device_type = %found.device_type, "device type has no grade mapping, skipped");
                continue;
            };
            resolved.push((
                host_id.clone(),
                HostLabels {
                    ip: found.ip.clone(),
                    asset_id: found.asset_id.clone(),
                    resource_type: grade.resource_type,
                    device_type: found.device_type.clone(),
                    region: found.region.clone(),
                    zone: found.zone.clone(),
                    grade: grade.grade.clone(),
                },
            ));
        }
        if resolved.is_empty() {
            return Err(PoolError::Validation(
                "no requested host resolves to launchable inventory".to_string(),
            ));
        }

        let task_id = self.store.next_id(collections::LAUNCH_TASK).await?;
        let task = LaunchTask::new(
            task_id,
            operator.to_string(),
            resolved.iter().map(|(id, _)| id.clone()).collect(),
        );
        self.store.insert_launch_task(task).await?;

        for (host_id, labels) in resolved {
            let record_id = self.store.next_id(collections::OP_RECORD).await?;
            let record = OpRecord::new(
                record_id,
                host_id,
                labels,
                OpType::Launch,
                task_id,
                OpPhase::Init,
                operator.to_string(),
            );
            self.store.insert_op_record(record).await?;
        }

        self.launcher_queue.enqueue(task_id);
        info!(task_id, operator, "launch task created");
        Ok(task_id)
    }

    /// Create a recall task withdrawing `replicas` hosts matching the spec.
    pub async fn create_recall_task(&self, operator: &str, spec: RecallSpec) -> Result<i64> {
        if spec.replicas == 0 {
            return Err(PoolError::Validation("replicas must be non-zero".to_string()));
        }
        let Some(grade) = self.grades.lookup(&spec.device_type) else {
            return Err(PoolError::Validation(format!(
                "unknown device type {}",
                spec.device_type
            )));
        };

        let mut selectors = vec![
            Selector::eq(LabelKey::ResourceType, grade.resource_type.to_string()),
            Selector::eq(LabelKey::DeviceType, spec.device_type.clone()),
            Selector::eq(LabelKey::Grade, grade.grade.clone()),
        ];
        if let Some(region) = &spec.region {
            selectors.push(Selector::eq(LabelKey::Region, region.clone()));
        }
        if let Some(zone) = &spec.zone {
            selectors.push(Selector::eq(LabelKey::Zone, zone.clone()));
        }
        if let Some(asset_ids) = &spec.asset_ids {
            selectors.push(Selector::within(LabelKey::AssetId, asset_ids.clone()));
        }

        let task_id = self.store.next_id(collections::RECALL_TASK).await?;
        let policy = spec.policy.clone();
        let task = RecallTask::new(task_id, operator.to_string(), spec, selectors);
        self.store.insert_recall_task(task).await?;

        let order_id = self.store.next_id(collections::RECALL_ORDER).await?;
        self.store
            .insert_recall_order(RecallOrder::new(order_id, task_id, policy))
            .await?;

        self.recaller_queue.enqueue(task_id);
        info!(task_id, operator, "recall task created");
        Ok(task_id)
    }

    /// Lend idle hosts to a destination business.
    ///
    /// All precondition checks run before any transfer, so a non-idle host
    /// anywhere in the batch rejects the whole call with zero side effects.
    /// The check and the subsequent writes are not mutually excluded
    /// against a concurrent draw on an overlapping host set; rows carry no
    /// version field.
    pub async fn draw_hosts(&self, host_ids: Vec<String>, dest_biz: i64) -> Result<()> {
        if host_ids.is_empty() {
            return Err(PoolError::Validation("host id list is empty".to_string()));
        }

        let mut hosts: Vec<PoolHost> = Vec::with_capacity(host_ids.len());
        for host_id in &host_ids {
            let Some(host) = self.store.get_host(host_id).await? else {
                return Err(PoolError::Precondition(format!(
                    "host {host_id} is not in the pool"
                )));
            };
            if host.status.phase != HostPhase::Idle {
                return Err(PoolError::Precondition(format!(
                    "host {host_id} is {}, not idle",
                    host.status.phase
                )));
            }
            hosts.push(host);
        }

        let topology = &self.config.inventory;
        for mut host in hosts {
            let ids = vec![host.host_id.clone()];
            // Module 0 is the destination business's default intake.
            self.transfer(topology.pool_biz, &ids, dest_biz, 0).await?;
            host.status.phase = HostPhase::InUse;
            host.status.drawn_at = Some(chrono::Utc::now());
            host.status.lent_to = Some(dest_biz);
            self.store.update_host(host).await?;
        }
        info!(count = host_ids.len(), dest_biz, "hosts drawn");
        Ok(())
    }

    /// Take lent hosts back under a recall task and start their
    /// decommission pipelines.
    pub async fn return_hosts(
        &self,
        recall_id: i64,
        from_biz: i64,
        host_ids: Vec<String>,
    ) -> Result<()> {
        if host_ids.is_empty() {
            return Err(PoolError::Validation("host id list is empty".to_string()));
        }
        let Some(mut task) = self.store.get_recall_task(recall_id).await? else {
            return Err(PoolError::Validation(format!(
                "recall task {recall_id} does not exist"
            )));
        };
        if task.status.phase == TaskPhase::Success {
            return Err(PoolError::Precondition(format!(
                "recall task {recall_id} is already success"
            )));
        }

        let mut hosts: Vec<PoolHost> = Vec::with_capacity(host_ids.len());
        for host_id in &host_ids {
            let Some(host) = self.store.get_host(host_id).await? else {
                return Err(PoolError::Precondition(format!(
                    "host {host_id} is not in the pool"
                )));
            };
            if host.status.phase != HostPhase::InUse {
                return Err(PoolError::Precondition(format!(
                    "host {host_id} is {}, not in use",
                    host.status.phase
                )));
            }
            hosts.push(host);
        }

        // The claimed source business must match the inventory record;
        // transferring out of the wrong business would strand the host.
        let relations = retry_until(
            api::INVENTORY,
            self.config.retry_timeout(),
            self.config.retry_interval(),
            || async {
                if !self.limits.try_acquire(api::INVENTORY, OpKind::Read) {
                    return Outcome::Retry;
                }
                Outcome::from_result(self.inventory.find_host_biz_relation(&host_ids).await)
            },
        )
        .await
        .map_err(|e| match e {
            PoolError::Exhausted(name) => PoolError::adapter(name, "retry budget exhausted"),
            other => other,
        })?;
        for host_id in &host_ids {
            match relations.iter().find(|r| r.host_id == *host_id) {
                Some(relation) if relation.biz == from_biz => {}
                Some(relation) => {
                    return Err(PoolError::Precondition(format!(
                        "host {host_id} belongs to biz {}, not {from_biz}",
                        relation.biz
                    )))
                }
                None => {
                    return Err(PoolError::Precondition(format!(
                        "host {host_id} has no inventory business relation"
                    )))
                }
            }
        }

        let topology = &self.config.inventory;
        let mut returned: u32 = 0;
        for mut host in hosts {
            let ids = vec![host.host_id.clone()];
            self.transfer(from_biz, &ids, topology.pool_biz, topology.transit_module)
                .await?;

            host.status.phase = HostPhase::ForRecall;
            host.status.recall_task = Some(recall_id);
            host.status.returned_at = Some(chrono::Utc::now());
            host.status.lent_to = None;
            let host_id = host.host_id.clone();
            let labels = host.labels.clone();
            self.store.update_host(host).await?;

            let record_id = self.store.next_id(collections::OP_RECORD).await?;
            // Phase Success: the hand-off itself is complete, the recycle
            // pipeline tracks its own progress in the detail row.
            let record = OpRecord::new(
                record_id,
                host_id.clone(),
                labels.clone(),
                OpType::Recall,
                recall_id,
                OpPhase::Success,
                task.operator.clone(),
            );
            self.store.insert_op_record(record).await?;

            let detail = RecallDetail::new(recall_id, host_id, labels, task.operator.clone());
            let detail_id = detail.id.clone();
            self.store.insert_detail(detail).await?;
            self.recycler_queue.enqueue(detail_id);
            returned += 1;
        }

        task.status.record_success(returned);
        self.store.update_recall_task(task).await?;
        info!(recall_id, returned, "hosts returned");
        Ok(())
    }

    /// Re-enqueue stuck decommission pipelines. The sole externally
    /// triggered recovery path; each detail resumes from its persisted
    /// status, not from the beginning.
    pub async fn resume_recycle_task(&self, detail_ids: Vec<String>) -> Result<()> {
        if detail_ids.is_empty() {
            return Err(PoolError::Validation("detail id list is empty".to_string()));
        }
        let mut resumed = 0usize;
        for detail_id in detail_ids {
            let Some(detail) = self.store.get_detail(&detail_id).await? else {
                warn!(detail_id, "resume requested for unknown detail");
                continue;
            };
            if detail.status.is_terminal() {
                warn!(detail_id, status = %detail.status, "resume requested for finished detail");
                continue;
            }
            self.recycler_queue.enqueue(detail_id);
            resumed += 1;
        }
        if resumed == 0 {
            return Err(PoolError::Validation(
                "no detail id resolves to an existing row".to_string(),
            ));
        }
        info!(resumed, "recycle details re-enqueued");
        Ok(())
    }

    pub async fn get_launch_task(&self, id: i64) -> Result<Option<LaunchTask>> {
        self.store.get_launch_task(id).await
    }

    pub async fn get_recall_task(&self, id: i64) -> Result<Option<RecallTask>> {
        self.store.get_recall_task(id).await
    }

    /// Paged decommission progress for one recall task.
    pub async fn list_recall_details(
        &self,
        task_id: i64,
        page: Page,
        count_only: bool,
    ) -> Result<DetailPage> {
        let count = self.store.count_details(task_id).await?;
        let info = if count_only {
            Vec::new()
        } else {
            self.store.list_details(task_id, page).await?
        };
        Ok(DetailPage { count, info })
    }

    async fn transfer(
        &self,
        from_biz: i64,
        host_ids: &[String],
        to_biz: i64,
        to_module: i64,
    ) -> Result<()> {
        retry_until(
            api::INVENTORY,
            self.config.retry_timeout(),
            self.config.retry_interval(),
            || async {
                if !self.limits.try_acquire(api::INVENTORY, OpKind::Write) {
                    return Outcome::Retry;
                }
                Outcome::from_result(
                    self.inventory
                        .transfer_hosts(from_biz, host_ids, to_biz, to_module)
                        .await,
                )
            },
        )
        .await
        .map_err(|e| match e {
            PoolError::Exhausted(name) => PoolError::adapter(name, "retry budget exhausted"),
            other => other,
        })
    }
}
