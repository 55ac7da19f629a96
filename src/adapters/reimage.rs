//! Bare-metal fleet-reimage service contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimageStatus {
    Accepted,
    Preparing,
    Installing,
    Done,
    Rejected,
    Expired,
}

impl ReimageStatus {
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Rejected | Self::Expired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReimageOrder {
    pub order_id: String,
    pub status: ReimageStatus,
}

#[async_trait]
pub trait BareMetalReimageApi: Send + Sync {
    /// Submit a reimage order for one physical machine. Returns the
    /// order id to poll.
    async fn create_reinstall_task(
        &self,
        asset_id: &str,
        password: &str,
        os_version: &str,
    ) -> Result<String>;

    /// Status list for the given orders; consumers match rows by order id.
    async fn get_reinstall_task_status(&self, order_ids: &[String]) -> Result<Vec<ReimageOrder>>;
}
