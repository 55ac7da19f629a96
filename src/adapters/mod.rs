//! # External Automation Adapters
//!
//! Narrow call/poll contracts to the independent automation systems the
//! pipelines coordinate with: inventory transfer, two job runners, the
//! cloud provider, bare-metal reimage, and credential fetch. Each is an
//! async trait so worker code can be exercised against scripted mocks.

pub mod cloud;
pub mod credential;
pub mod inventory;
pub mod ops_job;
pub mod reimage;
pub mod so_job;

pub use cloud::{CloudInstance, CloudInstanceApi, CloudOpState};
pub use credential::CredentialService;
pub use inventory::{HostBizRelation, InventoryHost, InventoryService};
pub use ops_job::{OpsJob, OpsJobRunner, OpsTaskState};
pub use reimage::{BareMetalReimageApi, ReimageOrder, ReimageStatus};
pub use so_job::{SoJobHost, SoJobHostResult, SoJobRunner, SoJobState, SoJobStatus};
