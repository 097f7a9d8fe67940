// ABOUTME: Launch template operations trait for cloud providers.

use super::shared_types::TemplateSpec;
use async_trait::async_trait;

/// Launch template lifecycle operations.
#[async_trait]
pub trait TemplateOps: Send + Sync {
    /// Create a launch template from the given specification.
    async fn create_template(&self, spec: &TemplateSpec) -> Result<(), TemplateError>;

    /// Delete a launch template.
    async fn delete_template(&self, name: &str) -> Result<(), TemplateError>;
}

/// Errors from launch template operations.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("launch template not found: {0}")]
    NotFound(String),

    #[error("launch template already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid template specification: {0}")]
    InvalidSpec(String),

    #[error("provider error: {0}")]
    Provider(String),
}
