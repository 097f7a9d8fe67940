// ABOUTME: Tests for deadline-bounded polling and bounded resize retry.
// ABOUTME: Uses the paused tokio clock to make timing deterministic.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use armada::cloud::memory::MemoryCloud;
use armada::cloud::{GroupOps, GroupSpec};
use armada::config::Capacity;
use armada::deploy::{DeployError, poll_until, resize_with_retry};

/// Test: a polling loop fails with a timeout error exactly when elapsed
/// time exceeds the deadline at the pre-sleep check. With a 10s deadline
/// and 3s interval the checks land at t=0,3,6,9,12; only t=12 exceeds it.
#[tokio::test(start_paused = true)]
async fn times_out_only_past_the_deadline() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = poll_until(
        "a thing that never readies",
        Duration::from_secs(10),
        Duration::from_secs(3),
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }
        },
    )
    .await;

    assert!(matches!(result, Err(DeployError::Timeout { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

/// Test: an elapsed time exactly equal to the deadline does not time out;
/// the loop sleeps once more and fails on the next not-ready check.
#[tokio::test(start_paused = true)]
async fn exact_deadline_gets_one_more_poll() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = poll_until(
        "a thing that never readies",
        Duration::from_secs(6),
        Duration::from_secs(3),
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }
        },
    )
    .await;

    assert!(matches!(result, Err(DeployError::Timeout { .. })));
    // t=0,3,6 are within the deadline; t=9 is the failing check.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// Test: readiness short-circuits the deadline entirely.
#[tokio::test(start_paused = true)]
async fn succeeds_as_soon_as_ready() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = poll_until(
        "a thing that readies on the third poll",
        Duration::from_secs(60),
        Duration::from_secs(5),
        move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3) }
        },
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Test: an error from the check propagates immediately instead of being
/// treated as not-ready.
#[tokio::test(start_paused = true)]
async fn check_errors_propagate() {
    let result = poll_until(
        "a thing that breaks",
        Duration::from_secs(60),
        Duration::from_secs(5),
        || async { Err(DeployError::Config("broken".to_string())) },
    )
    .await;

    assert!(matches!(result, Err(DeployError::Config(_))));
}

fn test_group(name: &str) -> GroupSpec {
    GroupSpec {
        name: name.to_string(),
        launch_template: format!("{name}-template"),
        capacity: Capacity::new(1, 1, 1).unwrap(),
        subnets: vec![],
        target_groups: vec![],
        tags: Default::default(),
    }
}

/// Test: transient resize failures are retried with backoff and succeed
/// within the bounded attempts.
#[tokio::test(start_paused = true)]
async fn resize_recovers_from_transient_failures() {
    let cloud = MemoryCloud::new(support::region("us-east-1"));
    cloud.create_group(&test_group("app-v000")).await.unwrap();
    cloud.fail_resizes("app-v000", 2);

    let capacity = Capacity::new(2, 2, 2).unwrap();
    resize_with_retry(&cloud, "app-v000", capacity)
        .await
        .expect("third attempt should succeed");
    assert_eq!(cloud.group_capacity("app-v000"), Some(capacity));
}

/// Test: once the attempts are exhausted the error is propagated
/// with the failing group named.
#[tokio::test(start_paused = true)]
async fn resize_exhaustion_propagates() {
    let cloud = MemoryCloud::new(support::region("us-east-1"));
    cloud.create_group(&test_group("app-v000")).await.unwrap();
    cloud.fail_resizes("app-v000", 5);

    let result = resize_with_retry(&cloud, "app-v000", Capacity::new(2, 2, 2).unwrap()).await;
    match result {
        Err(DeployError::ResizeExhausted { group, attempts, .. }) => {
            assert_eq!(group, "app-v000");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected ResizeExhausted, got {other:?}"),
    }
}
