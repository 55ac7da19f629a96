//! Ops-automation job runner contract (template-backed jobs).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Handle of a created automation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsJob {
    pub task_id: i64,
    pub url: String,
}

/// Lifecycle of a template run. Anything the runner reports outside
/// Created/Running/Finished is mapped to Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpsTaskState {
    Created,
    Running,
    Finished,
    Failed,
}

impl OpsTaskState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

/// Contract to the ops-automation runner: instantiate a template against a
/// host, start it, poll it.
#[async_trait]
pub trait OpsJobRunner: Send + Sync {
    async fn create_task(
        &self,
        template_id: i64,
        biz_id: i64,
        constants: &HashMap<String, String>,
    ) -> Result<OpsJob>;

    async fn start_task(&self, task_id: i64, biz_id: i64) -> Result<()>;

    async fn get_task_status(&self, task_id: i64, biz_id: i64) -> Result<OpsTaskState>;
}
