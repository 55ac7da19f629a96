//! Aggregate task records for onboarding and recall.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::host::{OsType, Selector};

/// Aggregate phase of a launch or recall task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Init,
    Running,
    Paused,
    Success,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate counters of a task.
///
/// `success + pending == total` holds at every persisted update, and the
/// phase is Success iff `success >= total`. For recall tasks "success"
/// means the host-level hand-off completed; the per-host decommission
/// pipelines may still be mid-flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub phase: TaskPhase,
    pub total: u32,
    pub success: u32,
    pub pending: u32,
    pub failed: u32,
    pub message: String,
}

impl TaskStatus {
    pub fn new(total: u32) -> Self {
        Self {
            phase: TaskPhase::Init,
            total,
            success: 0,
            pending: total,
            failed: 0,
            message: String::new(),
        }
    }

    /// Record `n` hosts having completed their hand-off.
    pub fn record_success(&mut self, n: u32) {
        self.success = (self.success + n).min(self.total);
        self.pending = self.total - self.success;
        self.phase = if self.success >= self.total {
            TaskPhase::Success
        } else {
            TaskPhase::Running
        };
    }

    /// Mark the whole task failed with a message. Counters are left as
    /// they were; `failed` records how many hosts the failure covered.
    pub fn record_failure<S: Into<String>>(&mut self, n: u32, message: S) {
        self.failed += n;
        self.phase = TaskPhase::Failed;
        self.message = message.into();
    }

    /// Note progress without completing anything (first dispatch that
    /// found fewer matches than requested).
    pub fn mark_running(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = TaskPhase::Running;
        }
    }
}

/// Onboarding of a batch of hosts into the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTask {
    pub id: i64,
    pub operator: String,
    pub host_ids: Vec<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LaunchTask {
    pub fn new(id: i64, operator: String, host_ids: Vec<String>) -> Self {
        let now = Utc::now();
        let total = host_ids.len() as u32;
        Self {
            id,
            operator,
            host_ids,
            status: TaskStatus::new(total),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client request to withdraw hosts from the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallSpec {
    pub device_type: String,
    pub replicas: u32,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub asset_ids: Option<Vec<String>>,
    /// Target reimage policy; falls back to the configured default when
    /// absent.
    pub policy: Option<RecyclePolicy>,
}

/// A request to withdraw `replicas` hosts matching the selector list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallTask {
    pub id: i64,
    pub operator: String,
    pub spec: RecallSpec,
    /// Ordered selector list compiled from the spec plus grade lookup.
    pub selectors: Vec<Selector>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecallTask {
    pub fn new(id: i64, operator: String, spec: RecallSpec, selectors: Vec<Selector>) -> Self {
        let now = Utc::now();
        let total = spec.replicas;
        Self {
            id,
            operator,
            spec,
            selectors,
            status: TaskStatus::new(total),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reinstallation parameters applied during the recycle pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecyclePolicy {
    pub image_id: String,
    pub os_type: OsType,
}

/// A recall task plus its recycle policy, created 1:1 alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallOrder {
    pub id: i64,
    pub task_id: i64,
    pub policy: Option<RecyclePolicy>,
    pub created_at: DateTime<Utc>,
}

impl RecallOrder {
    pub fn new(id: i64, task_id: i64, policy: Option<RecyclePolicy>) -> Self {
        Self {
            id,
            task_id,
            policy,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_hold_aggregate_invariant() {
        let mut status = TaskStatus::new(3);
        assert_eq!(status.phase, TaskPhase::Init);
        assert_eq!(status.success + status.pending, status.total);

        status.record_success(1);
        assert_eq!(status.phase, TaskPhase::Running);
        assert_eq!(status.success + status.pending, status.total);

        status.record_success(2);
        assert_eq!(status.phase, TaskPhase::Success);
        assert_eq!(status.pending, 0);
        assert_eq!(status.success + status.pending, status.total);
    }

    #[test]
    fn test_success_is_capped_at_total() {
        let mut status = TaskStatus::new(2);
        status.record_success(5);
        assert_eq!(status.success, 2);
        assert_eq!(status.pending, 0);
        assert_eq!(status.phase, TaskPhase::Success);
    }

    #[test]
    fn test_failure_keeps_counts() {
        let mut status = TaskStatus::new(4);
        status.record_success(1);
        status.record_failure(3, "inventory transfer refused");
        assert_eq!(status.phase, TaskPhase::Failed);
        assert_eq!(status.success, 1);
        assert_eq!(status.failed, 3);
        assert_eq!(status.message, "inventory transfer refused");
    }

    #[test]
    fn test_launch_task_totals_follow_hosts() {
        let task = LaunchTask::new(1, "ops".into(), vec!["h1".into(), "h2".into()]);
        assert_eq!(task.status.total, 2);
        assert_eq!(task.status.pending, 2);
        assert_eq!(task.status.phase, TaskPhase::Init);
    }
}
