//! In-memory reference implementation of [`PoolStore`].
//!
//! DashMap-backed, one map per collection, with per-collection atomic
//! sequences. Find results are ordered by row id so paging is stable.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::{HostQuery, Page, PoolStore};
use crate::error::{PoolError, Result};
use crate::models::{
    LaunchTask, OpPhase, OpRecord, OpType, PoolHost, RecallDetail, RecallOrder, RecallTask,
};

#[derive(Default)]
pub struct MemoryStore {
    sequences: DashMap<String, Arc<AtomicI64>>,
    hosts: DashMap<String, PoolHost>,
    launch_tasks: DashMap<i64, LaunchTask>,
    recall_tasks: DashMap<i64, RecallTask>,
    recall_orders: DashMap<i64, RecallOrder>,
    op_records: DashMap<i64, OpRecord>,
    details: DashMap<String, RecallDetail>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn page<T>(mut rows: Vec<T>, page: Page) -> Vec<T> {
        if page.offset >= rows.len() {
            return Vec::new();
        }
        let mut rows = rows.split_off(page.offset);
        rows.truncate(page.limit);
        rows
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn next_id(&self, collection: &str) -> Result<i64> {
        let seq = self
            .sequences
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone();
        Ok(seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn upsert_host(&self, host: PoolHost) -> Result<()> {
        self.hosts.insert(host.host_id.clone(), host);
        Ok(())
    }

    async fn update_host(&self, host: PoolHost) -> Result<()> {
        if !self.hosts.contains_key(&host.host_id) {
            return Err(PoolError::Store(format!(
                "pool host {} does not exist",
                host.host_id
            )));
        }
        self.hosts.insert(host.host_id.clone(), host);
        Ok(())
    }

    async fn get_host(&self, host_id: &str) -> Result<Option<PoolHost>> {
        Ok(self.hosts.get(host_id).map(|h| h.clone()))
    }

    async fn find_hosts(&self, query: &HostQuery, page: Page) -> Result<Vec<PoolHost>> {
        let mut rows: Vec<PoolHost> = self
            .hosts
            .iter()
            .filter(|h| query.matches(h.value()))
            .map(|h| h.clone())
            .collect();
        rows.sort_by(|a, b| a.host_id.cmp(&b.host_id));
        Ok(Self::page(rows, page))
    }

    async fn count_hosts(&self, query: &HostQuery) -> Result<u64> {
        Ok(self.hosts.iter().filter(|h| query.matches(h.value())).count() as u64)
    }

    async fn insert_launch_task(&self, task: LaunchTask) -> Result<()> {
        self.launch_tasks.insert(task.id, task);
        Ok(())
    }

    async fn update_launch_task(&self, mut task: LaunchTask) -> Result<()> {
        if !self.launch_tasks.contains_key(&task.id) {
            return Err(PoolError::Store(format!(
                "launch task {} does not exist",
                task.id
            )));
        }
        task.updated_at = Utc::now();
        self.launch_tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_launch_task(&self, id: i64) -> Result<Option<LaunchTask>> {
        Ok(self.launch_tasks.get(&id).map(|t| t.clone()))
    }

    async fn insert_recall_task(&self, task: RecallTask) -> Result<()> {
        self.recall_tasks.insert(task.id, task);
        Ok(())
    }

    async fn update_recall_task(&self, mut task: RecallTask) -> Result<()> {
        if !self.recall_tasks.contains_key(&task.id) {
            return Err(PoolError::Store(format!(
                "recall task {} does not exist",
                task.id
            )));
        }
        task.updated_at = Utc::now();
        self.recall_tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_recall_task(&self, id: i64) -> Result<Option<RecallTask>> {
        Ok(self.recall_tasks.get(&id).map(|t| t.clone()))
    }

    async fn insert_recall_order(&self, order: RecallOrder) -> Result<()> {
        self.recall_orders.insert(order.id, order);
        Ok(())
    }

    async fn get_recall_order_for_task(&self, task_id: i64) -> Result<Option<RecallOrder>> {
        Ok(self
            .recall_orders
            .iter()
            .find(|o| o.task_id == task_id)
            .map(|o| o.clone()))
    }

    async fn insert_op_record(&self, record: OpRecord) -> Result<()> {
        self.op_records.insert(record.id, record);
        Ok(())
    }

    async fn list_op_records(&self, op: OpType, task_id: i64) -> Result<Vec<OpRecord>> {
        let mut rows: Vec<OpRecord> = self
            .op_records
            .iter()
            .filter(|r| r.op == op && r.task_id == task_id)
            .map(|r| r.clone())
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn update_op_records_phase(
        &self,
        op: OpType,
        task_id: i64,
        phase: OpPhase,
        message: &str,
    ) -> Result<()> {
        let now = Utc::now();
        for mut record in self.op_records.iter_mut() {
            if record.op == op && record.task_id == task_id {
                record.phase = phase;
                record.message = message.to_string();
                record.updated_at = now;
            }
        }
        Ok(())
    }

    async fn insert_detail(&self, detail: RecallDetail) -> Result<()> {
        self.details.insert(detail.id.clone(), detail);
        Ok(())
    }

    async fn update_detail(&self, mut detail: RecallDetail) -> Result<()> {
        if !self.details.contains_key(&detail.id) {
            return Err(PoolError::Store(format!(
                "recall detail {} does not exist",
                detail.id
            )));
        }
        detail.updated_at = Utc::now();
        self.details.insert(detail.id.clone(), detail);
        Ok(())
    }

    async fn get_detail(&self, id: &str) -> Result<Option<RecallDetail>> {
        Ok(self.details.get(id).map(|d| d.clone()))
    }

    async fn list_details(&self, task_id: i64, page: Page) -> Result<Vec<RecallDetail>> {
        let mut rows: Vec<RecallDetail> = self
            .details
            .iter()
            .filter(|d| d.task_id == task_id)
            .map(|d| d.clone())
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self::page(rows, page))
    }

    async fn count_details(&self, task_id: i64) -> Result<u64> {
        Ok(self.details.iter().filter(|d| d.task_id == task_id).count() as u64)
    }
}
