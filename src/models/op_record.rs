//! Per-host audit rows, one per (host, operation) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::host::HostLabels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Launch,
    Recall,
    Recycle,
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch => write!(f, "launch"),
            Self::Recall => write!(f, "recall"),
            Self::Recycle => write!(f, "recycle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpPhase {
    Init,
    Running,
    Success,
    Failed,
}

/// Append-only audit row. Bulk-updated when the owning task's aggregate
/// phase changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpRecord {
    pub id: i64,
    pub host_id: String,
    /// Labels snapshot taken when the record was created.
    pub labels: HostLabels,
    pub op: OpType,
    pub task_id: i64,
    pub phase: OpPhase,
    pub message: String,
    pub operator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OpRecord {
    pub fn new(
        id: i64,
        host_id: String,
        labels: HostLabels,
        op: OpType,
        task_id: i64,
        phase: OpPhase,
        operator: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            host_id,
            labels,
            op,
            task_id,
            phase,
            message: String::new(),
            operator,
            created_at: now,
            updated_at: now,
        }
    }
}
