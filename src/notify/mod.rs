// ABOUTME: Notification collaborator invoked at key deployment transitions.
// ABOUTME: Delivery failures are logged and never abort the pipeline.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Simple-message notification capability.
///
/// Implementations deliver to chat webhooks or similar; this crate only
/// depends on the contract.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn send_simple_message(&self, message: &str) -> Result<(), NotifyError>;
}

/// Drops every message. Useful in tests.
pub struct NoopNotifier;

#[async_trait]
impl Notify for NoopNotifier {
    async fn send_simple_message(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Logs every message through tracing. The default for rehearsal runs.
pub struct LogNotifier;

#[async_trait]
impl Notify for LogNotifier {
    async fn send_simple_message(&self, message: &str) -> Result<(), NotifyError> {
        info!(target: "armada::notify", "{message}");
        Ok(())
    }
}

/// Send a message, logging delivery failures instead of propagating them.
pub async fn send_best_effort(notifier: &dyn Notify, message: &str) {
    if let Err(e) = notifier.send_simple_message(message).await {
        warn!(error = %e, "notification delivery failed");
    }
}
