//! Shared fixtures: an in-memory store rig with scriptable adapter mocks.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use hostpool_core::adapters::{
    BareMetalReimageApi, CloudInstance, CloudInstanceApi, CloudOpState, CredentialService,
    HostBizRelation, InventoryHost, InventoryService, OpsJob, OpsJobRunner, OpsTaskState,
    SoJobHost, SoJobRunner, SoJobState, SoJobStatus,
};
use hostpool_core::config::PoolConfig;
use hostpool_core::error::{PoolError, Result};
use hostpool_core::models::{GradeEntry, HostLabels, ResourceType};
use hostpool_core::orchestration::{Launcher, PoolFacade, Recaller, Recycler};
use hostpool_core::queue::DedupQueue;
use hostpool_core::resilience::{ApiBudget, ApiRateLimiter, RateBudget};
use hostpool_core::MemoryStore;

// --- inventory ---

pub struct MockInventory {
    pub hosts: Mutex<HashMap<String, InventoryHost>>,
    pub transfers: Mutex<Vec<(i64, Vec<String>, i64, i64)>>,
    pub fail_transfer: AtomicBool,
}

impl MockInventory {
    pub fn new() -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            transfers: Mutex::new(Vec::new()),
            fail_transfer: AtomicBool::new(false),
        }
    }

    pub fn seed(&self, host: InventoryHost) {
        self.hosts.lock().insert(host.host_id.clone(), host);
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().len()
    }
}

#[async_trait]
impl InventoryService for MockInventory {
    async fn transfer_hosts(
        &self,
        from_biz: i64,
        host_ids: &[String],
        to_biz: i64,
        to_module: i64,
    ) -> Result<()> {
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(PoolError::adapter("inventory", "transfer refused"));
        }
        self.transfers
            .lock()
            .push((from_biz, host_ids.to_vec(), to_biz, to_module));
        // Seeded records follow the transfer, like the real inventory.
        let mut hosts = self.hosts.lock();
        for id in host_ids {
            if let Some(host) = hosts.get_mut(id) {
                host.biz = to_biz;
                host.module = to_module;
            }
        }
        Ok(())
    }

    async fn list_hosts(&self, host_ids: &[String]) -> Result<Vec<InventoryHost>> {
        let hosts = self.hosts.lock();
        Ok(host_ids
            .iter()
            .filter_map(|id| hosts.get(id).cloned())
            .collect())
    }

    async fn find_host_biz_relation(&self, host_ids: &[String]) -> Result<Vec<HostBizRelation>> {
        let hosts = self.hosts.lock();
        Ok(host_ids
            .iter()
            .filter_map(|id| {
                hosts.get(id).map(|h| HostBizRelation {
                    host_id: h.host_id.clone(),
                    biz: h.biz,
                })
            })
            .collect())
    }
}

// --- ops-job runner ---

pub struct MockOpsJobs {
    next_id: AtomicI64,
    pub statuses: Mutex<HashMap<i64, OpsTaskState>>,
    pub created: Mutex<Vec<i64>>,
    pub started: Mutex<Vec<i64>>,
}

impl MockOpsJobs {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(9000),
            statuses: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, task_id: i64, state: OpsTaskState) {
        self.statuses.lock().insert(task_id, state);
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl OpsJobRunner for MockOpsJobs {
    async fn create_task(
        &self,
        template_id: i64,
        _biz_id: i64,
        _constants: &HashMap<String, String>,
    ) -> Result<OpsJob> {
        let task_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.lock().push(template_id);
        self.statuses.lock().insert(task_id, OpsTaskState::Running);
        Ok(OpsJob {
            task_id,
            url: format!("http://jobs/{task_id}"),
        })
    }

    async fn start_task(&self, task_id: i64, _biz_id: i64) -> Result<()> {
        self.started.lock().push(task_id);
        Ok(())
    }

    async fn get_task_status(&self, task_id: i64, _biz_id: i64) -> Result<OpsTaskState> {
        self.statuses
            .lock()
            .get(&task_id)
            .copied()
            .ok_or_else(|| PoolError::adapter("ops_job", format!("unknown task {task_id}")))
    }
}

// --- generic ("so") job runner ---

pub struct MockSoJobs {
    next_id: AtomicI64,
    pub statuses: Mutex<HashMap<i64, SoJobStatus>>,
    pub created: Mutex<Vec<String>>,
}

impl MockSoJobs {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(5000),
            statuses: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, job_id: i64, status: SoJobStatus) {
        self.statuses.lock().insert(job_id, status);
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl SoJobRunner for MockSoJobs {
    async fn create_job(&self, name: &str, _hosts: &[SoJobHost]) -> Result<i64> {
        let job_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.lock().push(name.to_string());
        self.statuses.lock().insert(
            job_id,
            SoJobStatus {
                state: SoJobState::Handling,
                hosts: Vec::new(),
            },
        );
        Ok(job_id)
    }

    async fn get_job_status(&self, job_id: i64) -> Result<SoJobStatus> {
        self.statuses
            .lock()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| PoolError::adapter("so_job", format!("unknown job {job_id}")))
    }
}

// --- cloud instance API ---

pub struct MockCloud {
    next_request: AtomicI64,
    pub instances: Mutex<HashMap<String, CloudInstance>>,
    pub resets: Mutex<Vec<(String, String)>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            next_request: AtomicI64::new(1),
            instances: Mutex::new(HashMap::new()),
            resets: Mutex::new(Vec::new()),
        }
    }

    pub fn set_instance(&self, instance: CloudInstance) {
        self.instances
            .lock()
            .insert(instance.instance_id.clone(), instance);
    }

    pub fn reset_count(&self) -> usize {
        self.resets.lock().len()
    }
}

#[async_trait]
impl CloudInstanceApi for MockCloud {
    async fn reset_instance(
        &self,
        instance_id: &str,
        image_id: &str,
        _password: &str,
    ) -> Result<String> {
        let request_id = format!("req-{}", self.next_request.fetch_add(1, Ordering::SeqCst));
        self.resets
            .lock()
            .push((instance_id.to_string(), image_id.to_string()));
        self.set_instance(CloudInstance {
            instance_id: instance_id.to_string(),
            latest_operation: "ResetInstance".to_string(),
            latest_operation_state: CloudOpState::Running,
            latest_operation_request_id: request_id.clone(),
        });
        Ok(request_id)
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<CloudInstance> {
        self.instances
            .lock()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| PoolError::adapter("cloud", format!("unknown instance {instance_id}")))
    }
}

// --- bare-metal reimage API ---

pub struct MockReimage {
    next_order: AtomicI64,
    pub orders: Mutex<HashMap<String, hostpool_core::adapters::ReimageStatus>>,
    pub created: Mutex<Vec<String>>,
}

impl MockReimage {
    pub fn new() -> Self {
        Self {
            next_order: AtomicI64::new(1),
            orders: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, order_id: &str, status: hostpool_core::adapters::ReimageStatus) {
        self.orders.lock().insert(order_id.to_string(), status);
    }
}

#[async_trait]
impl BareMetalReimageApi for MockReimage {
    async fn create_reinstall_task(
        &self,
        asset_id: &str,
        _password: &str,
        _os_version: &str,
    ) -> Result<String> {
        let order_id = format!("order-{}", self.next_order.fetch_add(1, Ordering::SeqCst));
        self.created.lock().push(asset_id.to_string());
        self.orders.lock().insert(
            order_id.clone(),
            hostpool_core::adapters::ReimageStatus::Accepted,
        );
        Ok(order_id)
    }

    async fn get_reinstall_task_status(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<hostpool_core::adapters::ReimageOrder>> {
        let orders = self.orders.lock();
        Ok(order_ids
            .iter()
            .filter_map(|id| {
                orders.get(id).map(|status| hostpool_core::adapters::ReimageOrder {
                    order_id: id.clone(),
                    status: *status,
                })
            })
            .collect())
    }
}

// --- credential service ---

pub struct MockCredentials;

#[async_trait]
impl CredentialService for MockCredentials {
    async fn get_pwd(&self, _ip: &str) -> Result<String> {
        Ok("pw-test".to_string())
    }
}

// --- rig ---

/// Tight retry/poll timings plus a known grade table.
pub fn test_config() -> PoolConfig {
    let mut config = PoolConfig::default();
    config.recycle.retry_timeout_secs = 1;
    config.recycle.retry_interval_ms = 5;
    config.pipelines.poll_delay_secs = 1;
    config.grades = vec![
        GradeEntry {
            device_type: "D1".to_string(),
            resource_type: ResourceType::CloudInstance,
            grade: "g1".to_string(),
        },
        GradeEntry {
            device_type: "D2".to_string(),
            resource_type: ResourceType::BareMetal,
            grade: "g2".to_string(),
        },
    ];
    config
}

pub fn inventory_host(host_id: &str, device_type: &str, biz: i64, module: i64) -> InventoryHost {
    InventoryHost {
        host_id: host_id.to_string(),
        ip: format!("10.0.0.{}", host_id.len()),
        asset_id: format!("asset-{host_id}"),
        device_type: device_type.to_string(),
        region: "sh".to_string(),
        zone: "sh-1".to_string(),
        biz,
        module,
    }
}

pub fn cloud_labels(host_id: &str) -> HostLabels {
    HostLabels {
        ip: format!("10.1.0.{}", host_id.len()),
        asset_id: format!("asset-{host_id}"),
        resource_type: ResourceType::CloudInstance,
        device_type: "D1".to_string(),
        region: "sh".to_string(),
        zone: "sh-1".to_string(),
        grade: "g1".to_string(),
    }
}

pub fn metal_labels(host_id: &str) -> HostLabels {
    HostLabels {
        ip: format!("10.2.0.{}", host_id.len()),
        asset_id: format!("asset-{host_id}"),
        resource_type: ResourceType::BareMetal,
        device_type: "D2".to_string(),
        region: "sh".to_string(),
        zone: "sh-1".to_string(),
        grade: "g2".to_string(),
    }
}

/// Everything wired against the in-memory store, with handles kept to
/// every mock so tests can script and inspect them.
pub struct Rig {
    pub store: Arc<MemoryStore>,
    pub inventory: Arc<MockInventory>,
    pub ops_jobs: Arc<MockOpsJobs>,
    pub so_jobs: Arc<MockSoJobs>,
    pub cloud: Arc<MockCloud>,
    pub reimage: Arc<MockReimage>,
    pub config: Arc<PoolConfig>,
    pub facade: Arc<PoolFacade>,
    pub launcher: Arc<Launcher>,
    pub recaller: Arc<Recaller>,
    pub recycler: Arc<Recycler>,
    pub launcher_queue: Arc<DedupQueue<i64>>,
    pub recaller_queue: Arc<DedupQueue<i64>>,
    pub recycler_queue: Arc<DedupQueue<String>>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let inventory = Arc::new(MockInventory::new());
        let ops_jobs = Arc::new(MockOpsJobs::new());
        let so_jobs = Arc::new(MockSoJobs::new());
        let cloud = Arc::new(MockCloud::new());
        let reimage = Arc::new(MockReimage::new());
        let credentials = Arc::new(MockCredentials);

        let generous = RateBudget {
            rate: 1000.0,
            burst: 1000,
        };
        let limits = Arc::new(ApiRateLimiter::new(
            HashMap::new(),
            ApiBudget {
                read: generous,
                write: generous,
            },
        ));
        let config = Arc::new(config);

        let launcher_queue = Arc::new(DedupQueue::<i64>::new());
        let recaller_queue = Arc::new(DedupQueue::<i64>::new());
        let recycler_queue = Arc::new(DedupQueue::<String>::new());

        let launcher = Arc::new(Launcher::new(
            store.clone() as Arc<dyn hostpool_core::PoolStore>,
            inventory.clone() as Arc<dyn InventoryService>,
            limits.clone(),
            config.clone(),
            launcher_queue.clone(),
        ));
        let recaller = Arc::new(Recaller::new(
            store.clone(),
            inventory.clone(),
            limits.clone(),
            config.clone(),
            recaller_queue.clone(),
            recycler_queue.clone(),
        ));
        let recycler = Arc::new(Recycler::new(
            store.clone(),
            inventory.clone(),
            ops_jobs.clone(),
            so_jobs.clone(),
            cloud.clone(),
            reimage.clone(),
            credentials,
            limits.clone(),
            config.clone(),
            recycler_queue.clone(),
        ));
        let facade = Arc::new(PoolFacade::new(
            store.clone(),
            inventory.clone(),
            limits,
            config.clone(),
            launcher_queue.clone(),
            recaller_queue.clone(),
            recycler_queue.clone(),
        ));

        Self {
            store,
            inventory,
            ops_jobs,
            so_jobs,
            cloud,
            reimage,
            config,
            facade,
            launcher,
            recaller,
            recycler,
            launcher_queue,
            recaller_queue,
            recycler_queue,
        }
    }
}
