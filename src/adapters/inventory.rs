//! Inventory/module-transfer service contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Authoritative inventory view of one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryHost {
    pub host_id: String,
    pub ip: String,
    pub asset_id: String,
    pub device_type: String,
    pub region: String,
    pub zone: String,
    /// Business the inventory record currently belongs to.
    pub biz: i64,
    /// Module within that business.
    pub module: i64,
}

/// Business ownership of a host as reported by the inventory system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBizRelation {
    pub host_id: String,
    pub biz: i64,
}

/// Narrow contract to the inventory system. Transfers move a host's record
/// between business modules; they do not touch the machine itself.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn transfer_hosts(
        &self,
        from_biz: i64,
        host_ids: &[String],
        to_biz: i64,
        to_module: i64,
    ) -> Result<()>;

    async fn list_hosts(&self, host_ids: &[String]) -> Result<Vec<InventoryHost>>;

    async fn find_host_biz_relation(&self, host_ids: &[String]) -> Result<Vec<HostBizRelation>>;
}
