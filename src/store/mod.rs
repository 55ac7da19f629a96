//! # Persistent Task Store Boundary
//!
//! Document-style storage for the entities in [`crate::models`], consumed
//! through a narrow typed contract: sequence-id allocation, insert,
//! whole-row update, and paged find/count by equality/range filters. The
//! production driver lives outside this crate; [`MemoryStore`] is the
//! reference implementation used by tests and local wiring.
//!
//! Workers treat the store as the single source of truth and re-read
//! persisted state before every transition; no in-memory state is trusted
//! across re-enqueues. No optimistic locking is applied beyond plain
//! filtered updates.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    LaunchTask, OpPhase, OpRecord, OpType, PoolHost, RecallDetail, RecallOrder, RecallTask,
    Selector,
};
use crate::state_machine::HostPhase;

pub use memory::MemoryStore;

/// Paging window for find/list calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// First `limit` rows.
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    /// Unbounded window.
    pub fn all() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// Equality/membership filter over pool-host rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostQuery {
    pub phase: Option<HostPhase>,
    pub selectors: Vec<Selector>,
}

impl HostQuery {
    pub fn with_phase(mut self, phase: HostPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_selectors(mut self, selectors: Vec<Selector>) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn matches(&self, host: &PoolHost) -> bool {
        if let Some(phase) = self.phase {
            if host.status.phase != phase {
                return false;
            }
        }
        self.selectors.iter().all(|s| s.matches(&host.labels))
    }
}

/// Narrow persistence contract consumed by the façade and workers.
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Allocate the next value of a named monotonic sequence.
    async fn next_id(&self, collection: &str) -> Result<i64>;

    // Pool hosts. `upsert_host` is the launch-cycle write path: it either
    // creates the row or refreshes an existing one in place.
    async fn upsert_host(&self, host: PoolHost) -> Result<()>;
    async fn update_host(&self, host: PoolHost) -> Result<()>;
    async fn get_host(&self, host_id: &str) -> Result<Option<PoolHost>>;
    async fn find_hosts(&self, query: &HostQuery, page: Page) -> Result<Vec<PoolHost>>;
    async fn count_hosts(&self, query: &HostQuery) -> Result<u64>;

    // Launch tasks.
    async fn insert_launch_task(&self, task: LaunchTask) -> Result<()>;
    async fn update_launch_task(&self, task: LaunchTask) -> Result<()>;
    async fn get_launch_task(&self, id: i64) -> Result<Option<LaunchTask>>;

    // Recall tasks and their 1:1 orders.
    async fn insert_recall_task(&self, task: RecallTask) -> Result<()>;
    async fn update_recall_task(&self, task: RecallTask) -> Result<()>;
    async fn get_recall_task(&self, id: i64) -> Result<Option<RecallTask>>;
    async fn insert_recall_order(&self, order: RecallOrder) -> Result<()>;
    async fn get_recall_order_for_task(&self, task_id: i64) -> Result<Option<RecallOrder>>;

    // Audit records.
    async fn insert_op_record(&self, record: OpRecord) -> Result<()>;
    async fn list_op_records(&self, op: OpType, task_id: i64) -> Result<Vec<OpRecord>>;
    async fn update_op_records_phase(
        &self,
        op: OpType,
        task_id: i64,
        phase: OpPhase,
        message: &str,
    ) -> Result<()>;

    // Recall details.
    async fn insert_detail(&self, detail: RecallDetail) -> Result<()>;
    async fn update_detail(&self, detail: RecallDetail) -> Result<()>;
    async fn get_detail(&self, id: &str) -> Result<Option<RecallDetail>>;
    async fn list_details(&self, task_id: i64, page: Page) -> Result<Vec<RecallDetail>>;
    async fn count_details(&self, task_id: i64) -> Result<u64>;
}
