// ABOUTME: Load balancing operations trait for cloud providers.
// ABOUTME: Target groups, target health, and load balancer lifecycle.

use super::shared_types::{LoadBalancerSpec, LoadBalancerSummary, TargetGroupSummary, TargetHealth};
use async_trait::async_trait;

/// Load balancing operations.
#[async_trait]
pub trait BalancingOps: Send + Sync {
    /// Create a target group as a copy of an existing one.
    async fn copy_target_group(
        &self,
        source: &str,
        target: &str,
    ) -> Result<TargetGroupSummary, BalancingError>;

    /// Delete a target group.
    async fn delete_target_group(&self, name: &str) -> Result<(), BalancingError>;

    /// List target groups whose names share the given prefix.
    async fn list_target_groups(
        &self,
        prefix: &str,
    ) -> Result<Vec<TargetGroupSummary>, BalancingError>;

    /// Health of every target registered with a target group.
    async fn target_health(&self, target_group: &str) -> Result<Vec<TargetHealth>, BalancingError>;

    /// Create a load balancer.
    async fn create_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
    ) -> Result<LoadBalancerSummary, BalancingError>;

    /// Delete a load balancer. Deletion is asynchronous on real providers;
    /// callers poll `describe_load_balancer` until it reports removal.
    async fn delete_load_balancer(&self, name: &str) -> Result<(), BalancingError>;

    /// Describe a load balancer, or `None` once the provider has removed it.
    async fn describe_load_balancer(
        &self,
        name: &str,
    ) -> Result<Option<LoadBalancerSummary>, BalancingError>;
}

/// Errors from load balancing operations.
#[derive(Debug, thiserror::Error)]
pub enum BalancingError {
    #[error("target group not found: {0}")]
    TargetGroupNotFound(String),

    #[error("target group already exists: {0}")]
    TargetGroupAlreadyExists(String),

    #[error("load balancer not found: {0}")]
    LoadBalancerNotFound(String),

    #[error("load balancer already exists: {0}")]
    LoadBalancerAlreadyExists(String),

    #[error("resource still in use: {0}")]
    InUse(String),

    #[error("provider error: {0}")]
    Provider(String),
}
