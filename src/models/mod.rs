//! # Data Model
//!
//! Durable entities of the pool orchestrator, one file per aggregate. The
//! persistent task store exclusively owns these rows; in-memory queue
//! entries only carry their identifiers.

pub mod grade;
pub mod host;
pub mod op_record;
pub mod recall_detail;
pub mod task;

pub use grade::{GradeCfg, GradeEntry};
pub use host::{HostLabels, HostStatus, LabelKey, OsType, PoolHost, ResourceType, Selector, SelectorOp};
pub use op_record::{OpPhase, OpRecord, OpType};
pub use recall_detail::{JobRef, RecallDetail};
pub use task::{LaunchTask, RecallOrder, RecallSpec, RecallTask, RecyclePolicy, TaskPhase, TaskStatus};
