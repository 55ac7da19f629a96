//! Per-host decommission pipeline state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::host::HostLabels;
use crate::constants::JOB_ID_SKIPPED;
use crate::state_machine::{RecycleState, RecycleStep};

/// External job handle recorded for one pipeline step.
///
/// An empty id means the job has not been created yet; the literal id
/// `"0"` marks a step that does not apply to the host's OS and passes
/// through on poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: String,
    pub biz_id: String,
    pub link: String,
}

impl JobRef {
    pub fn new<I: Into<String>, B: Into<String>, L: Into<String>>(
        id: I,
        biz_id: B,
        link: L,
    ) -> Self {
        Self {
            id: id.into(),
            biz_id: biz_id.into(),
            link: link.into(),
        }
    }

    /// The step was skipped for this host; poll treats it as passed.
    pub fn skipped() -> Self {
        Self {
            id: JOB_ID_SKIPPED.to_string(),
            biz_id: String::new(),
            link: String::new(),
        }
    }

    pub fn is_created(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn is_skipped(&self) -> bool {
        self.id == JOB_ID_SKIPPED
    }
}

/// Unit of Recycler state, id = `{recall_task_id}-{host_id}`.
///
/// Created by the Recaller (or the return-host path) once a host is
/// confirmed handed back; mutated exclusively by the Recycler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallDetail {
    pub id: String,
    pub task_id: i64,
    pub host_id: String,
    pub labels: HostLabels,
    pub status: RecycleState,
    pub clear_check: JobRef,
    pub reinstall: JobRef,
    pub initialize: JobRef,
    pub data_delete: JobRef,
    pub conf_check: JobRef,
    pub message: String,
    pub operator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecallDetail {
    /// Composite row id for a (recall task, host) pair.
    pub fn detail_id(task_id: i64, host_id: &str) -> String {
        format!("{task_id}-{host_id}")
    }

    pub fn new(task_id: i64, host_id: String, labels: HostLabels, operator: String) -> Self {
        let now = Utc::now();
        Self {
            id: Self::detail_id(task_id, &host_id),
            task_id,
            host_id,
            labels,
            status: RecycleState::Returned,
            clear_check: JobRef::default(),
            reinstall: JobRef::default(),
            initialize: JobRef::default(),
            data_delete: JobRef::default(),
            conf_check: JobRef::default(),
            message: String::new(),
            operator,
            created_at: now,
            updated_at: now,
        }
    }

    /// Job handle of the step backed by an external job, if any.
    /// PreCheck and Transit are fulfilled synchronously and carry none.
    pub fn job_ref(&self, step: RecycleStep) -> Option<&JobRef> {
        match step {
            RecycleStep::ClearCheck => Some(&self.clear_check),
            RecycleStep::Reinstall => Some(&self.reinstall),
            RecycleStep::Initialize => Some(&self.initialize),
            RecycleStep::DataDelete => Some(&self.data_delete),
            RecycleStep::ConfCheck => Some(&self.conf_check),
            RecycleStep::PreCheck | RecycleStep::Transit => None,
        }
    }

    pub fn set_job_ref(&mut self, step: RecycleStep, job: JobRef) {
        match step {
            RecycleStep::ClearCheck => self.clear_check = job,
            RecycleStep::Reinstall => self.reinstall = job,
            RecycleStep::Initialize => self.initialize = job,
            RecycleStep::DataDelete => self.data_delete = job,
            RecycleStep::ConfCheck => self.conf_check = job,
            RecycleStep::PreCheck | RecycleStep::Transit => {}
        }
    }

    /// Drop the recorded job handle so a resumed step re-runs its create
    /// phase instead of polling a known-failed job.
    pub fn clear_job_ref(&mut self, step: RecycleStep) {
        self.set_job_ref(step, JobRef::default());
    }
}
