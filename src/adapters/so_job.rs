//! Generic job runner contract with per-host sub-results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::OsType;

/// One host a job runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoJobHost {
    pub ip: String,
    pub os: OsType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoJobState {
    Success,
    Handling,
    Failed,
}

/// Per-host outcome. `code` carries the runner's failure classification
/// (e.g. [`crate::constants::PING_UNREACHABLE`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoJobHostResult {
    pub ip: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoJobStatus {
    pub state: SoJobState,
    pub hosts: Vec<SoJobHostResult>,
}

/// Contract to the generic job runner used for idle verification.
#[async_trait]
pub trait SoJobRunner: Send + Sync {
    async fn create_job(&self, name: &str, hosts: &[SoJobHost]) -> Result<i64>;

    async fn get_job_status(&self, job_id: i64) -> Result<SoJobStatus>;
}
