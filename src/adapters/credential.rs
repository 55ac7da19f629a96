//! Credential-fetch service contract.

use async_trait::async_trait;

use crate::error::Result;

/// One-time credential lookup used to parameterize reinstallation.
#[async_trait]
pub trait CredentialService: Send + Sync {
    async fn get_pwd(&self, ip: &str) -> Result<String>;
}
