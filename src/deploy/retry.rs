// ABOUTME: Bounded retry with a named linear backoff.
// ABOUTME: Used by resize, the one provider call that is routinely throttled.

use super::error::DeployError;
use crate::cloud::{CloudError, GroupOps};
use crate::config::Capacity;
use std::time::Duration;
use tracing::warn;

/// Attempts before a resize failure is propagated.
pub const RESIZE_ATTEMPTS: u32 = 3;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_STEP: Duration = Duration::from_secs(2);

/// Pause before retry number `attempt` (zero-based): `1s + 2s * attempt`.
pub fn linear_backoff(attempt: u32) -> Duration {
    BACKOFF_BASE + BACKOFF_STEP * attempt
}

/// Apply a new capacity to a live group, retrying with linear backoff.
pub async fn resize_with_retry<C: GroupOps + ?Sized>(
    client: &C,
    group: &str,
    capacity: Capacity,
) -> Result<(), DeployError> {
    let mut attempt = 0;

    loop {
        match client.resize_group(group, capacity).await {
            Ok(()) => return Ok(()),
            Err(source) => {
                attempt += 1;
                if attempt >= RESIZE_ATTEMPTS {
                    return Err(DeployError::ResizeExhausted {
                        group: group.to_string(),
                        attempts: attempt,
                        source: CloudError::from(source),
                    });
                }

                let pause = linear_backoff(attempt - 1);
                warn!(group, %capacity, attempt, ?pause, error = %source, "resize failed, retrying");
                tokio::time::sleep(pause).await;
            }
        }
    }
}
