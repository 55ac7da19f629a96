//! Wire-level constants shared across the worker pipelines.

/// External API names used as rate-limiter keys.
pub mod api {
    pub const INVENTORY: &str = "inventory";
    pub const OPS_JOB: &str = "ops_job";
    pub const SO_JOB: &str = "so_job";
    pub const CLOUD: &str = "cloud";
    pub const REIMAGE: &str = "reimage";
    pub const CREDENTIAL: &str = "credential";
}

/// Per-host result code reported by the clear-check automation when the
/// host no longer answers ping. Treated as "already powered off", not as
/// a step failure.
pub const PING_UNREACHABLE: &str = "PING_UNREACHABLE";

/// Sentinel job id recorded when a step does not apply to the host's OS.
/// The poll phase treats it as "nothing to check, proceed".
pub const JOB_ID_SKIPPED: &str = "0";

/// Collection names used for sequence-id allocation in the task store.
pub mod collections {
    pub const LAUNCH_TASK: &str = "launch_task";
    pub const RECALL_TASK: &str = "recall_task";
    pub const RECALL_ORDER: &str = "recall_order";
    pub const OP_RECORD: &str = "op_record";
}
