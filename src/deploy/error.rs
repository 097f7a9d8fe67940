// ABOUTME: Error types for deployment operations.
// ABOUTME: Covers step gating, timeouts, provider failures, and canary validation.

use crate::cloud::CloudError;
use std::time::Duration;

/// Errors that can occur while driving a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A phase handler ran before its predecessor completed.
    #[error("step {step} cannot run before {predecessor} has completed")]
    StepNotReady {
        step: &'static str,
        predecessor: &'static str,
    },

    /// A polling loop exceeded the run's deadline.
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    /// Invalid manifest/flag combination observed mid-run.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Completing a canary that was never started.
    #[error("no canary deployment to complete in region {0}")]
    CanaryNotStarted(String),

    /// A resize kept failing after the bounded retries.
    #[error("resize of {group} failed after {attempts} attempts: {source}")]
    ResizeExhausted {
        group: String,
        attempts: u32,
        source: CloudError,
    },

    /// Cloud provider failure.
    #[error("cloud provider error: {0}")]
    Cloud(#[from] CloudError),

    /// A fatal lifecycle callback failed.
    #[error("lifecycle callback {point} failed: {reason}")]
    Callback { point: String, reason: String },

    /// The post-deployment API test suite failed.
    #[error("api test for stack {stack} failed: {reason}")]
    ApiTest { stack: String, reason: String },

    /// A pipeline worker terminated abnormally.
    #[error("pipeline worker failed: {0}")]
    Worker(String),
}
