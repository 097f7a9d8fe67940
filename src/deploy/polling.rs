// ABOUTME: Deadline-bounded polling shared by health and termination checks.
// ABOUTME: The deadline is checked before sleeping so timeouts surface promptly.

use super::error::DeployError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Poll `check` until it reports ready, sleeping `interval` between
/// queries and failing with a timeout error once `timeout` has elapsed.
///
/// The elapsed-time check runs after each query and before the sleep, so
/// an exceeded deadline is detected at the pre-sleep check rather than one
/// full interval later.
pub async fn poll_until<F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), DeployError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, DeployError>>,
{
    let started = Instant::now();

    loop {
        if check().await? {
            return Ok(());
        }

        if started.elapsed() > timeout {
            return Err(DeployError::Timeout {
                what: what.to_string(),
                timeout,
            });
        }

        debug!(what, interval = ?interval, "not ready, polling again");
        tokio::time::sleep(interval).await;
    }
}
