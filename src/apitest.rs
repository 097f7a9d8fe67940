// ABOUTME: Post-deployment API test collaborator.
// ABOUTME: Runs an external test suite against the newly deployed stack.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiTestError {
    #[error("api test execution failed: {0}")]
    Execution(String),
}

/// Outcome of one API test suite run.
#[derive(Debug, Clone)]
pub struct ApiTestReport {
    pub passed: u32,
    pub failed: u32,
}

impl ApiTestReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// API test execution capability.
#[async_trait]
pub trait ApiTest: Send + Sync {
    async fn run(&self, stack: &str) -> Result<ApiTestReport, ApiTestError>;
}
