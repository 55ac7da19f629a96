//! Cloud provider instance API contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudOpState {
    Running,
    Success,
    Failed,
}

/// Provider-side view of an instance's most recent operation. Poll
/// consumers must cross-check `latest_operation_request_id` against the
/// request id they recorded, so a concurrent operation's result is never
/// mis-attributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudInstance {
    pub instance_id: String,
    pub latest_operation: String,
    pub latest_operation_state: CloudOpState,
    pub latest_operation_request_id: String,
}

#[async_trait]
pub trait CloudInstanceApi: Send + Sync {
    /// Reset the instance to the given image. Returns the request id of
    /// the asynchronous provider operation.
    async fn reset_instance(
        &self,
        instance_id: &str,
        image_id: &str,
        password: &str,
    ) -> Result<String>;

    async fn describe_instance(&self, instance_id: &str) -> Result<CloudInstance>;
}
