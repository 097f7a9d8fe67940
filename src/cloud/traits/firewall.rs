// ABOUTME: Security group operations trait for cloud providers.

use super::shared_types::SecurityGroupSpec;
use crate::types::SecurityGroupId;
use async_trait::async_trait;

/// Security group operations.
#[async_trait]
pub trait FirewallOps: Send + Sync {
    /// Create a security group, returning its provider-issued identifier.
    async fn create_security_group(
        &self,
        spec: &SecurityGroupSpec,
    ) -> Result<SecurityGroupId, FirewallError>;

    /// Delete a security group.
    async fn delete_security_group(&self, id: &SecurityGroupId) -> Result<(), FirewallError>;

    /// Look up a security group by name.
    async fn find_security_group(
        &self,
        name: &str,
    ) -> Result<Option<SecurityGroupId>, FirewallError>;

    /// Detach a security group from the given network interfaces.
    async fn detach_from_interfaces(
        &self,
        id: &SecurityGroupId,
        interfaces: &[String],
    ) -> Result<(), FirewallError>;
}

/// Errors from security group operations.
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    #[error("security group not found: {0}")]
    NotFound(String),

    #[error("security group already exists: {0}")]
    AlreadyExists(String),

    #[error("security group still in use: {0}")]
    InUse(String),

    #[error("provider error: {0}")]
    Provider(String),
}
