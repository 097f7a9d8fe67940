// ABOUTME: Autoscaling group operations trait for cloud providers.
// ABOUTME: Create, delete, resize, discover, and decorate compute groups.

use super::shared_types::{AlarmSpec, GroupSpec, GroupSummary, InstanceSummary, ScalingPolicySpec};
use crate::config::Capacity;
use async_trait::async_trait;

/// Autoscaling group lifecycle operations.
#[async_trait]
pub trait GroupOps: Send + Sync {
    /// Create a group from the given specification.
    async fn create_group(&self, spec: &GroupSpec) -> Result<(), GroupError>;

    /// Delete a group.
    async fn delete_group(&self, name: &str) -> Result<(), GroupError>;

    /// Apply a new capacity to a live group.
    async fn resize_group(&self, name: &str, capacity: Capacity) -> Result<(), GroupError>;

    /// List groups whose names share the given prefix.
    async fn list_groups_by_prefix(&self, prefix: &str) -> Result<Vec<GroupSummary>, GroupError>;

    /// Describe the live instances of a group.
    async fn describe_instances(&self, name: &str) -> Result<Vec<InstanceSummary>, GroupError>;

    /// Register the group's instances with a target group.
    async fn attach_target_group(&self, name: &str, target_group: &str)
    -> Result<(), GroupError>;

    /// Deregister the group's instances from a target group.
    async fn detach_target_group(&self, name: &str, target_group: &str)
    -> Result<(), GroupError>;

    /// Point the group at a different launch template.
    async fn set_launch_template(&self, name: &str, template: &str) -> Result<(), GroupError>;

    /// Remove a tag from the group.
    async fn untag_group(&self, name: &str, key: &str) -> Result<(), GroupError>;

    /// Enable group-level metrics collection.
    async fn enable_metrics_collection(&self, name: &str) -> Result<(), GroupError>;

    /// Attach a scaling policy to the group.
    async fn put_scaling_policy(
        &self,
        name: &str,
        policy: &ScalingPolicySpec,
    ) -> Result<(), GroupError>;

    /// Attach an alarm to the group.
    async fn put_alarm(&self, name: &str, alarm: &AlarmSpec) -> Result<(), GroupError>;
}

/// Errors from autoscaling group operations.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("group not found: {0}")]
    NotFound(String),

    #[error("group already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("provider error: {0}")]
    Provider(String),
}
