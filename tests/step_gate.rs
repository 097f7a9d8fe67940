// ABOUTME: Tests for step gating through the strategy surface.
// ABOUTME: A phase handler refuses to run before its predecessor completed.

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use armada::cloud::memory::MemoryCloud;
use armada::config::{RunMode, StrategyKind};
use armada::deploy::DeployError;
use armada::strategy::manager_for;
use armada::types::RegionId;

fn manager() -> Box<dyn armada::strategy::DeployManager> {
    let stack = support::stack("gate", StrategyKind::BlueGreen, &["us-east-1"]);
    let region = support::region("us-east-1");
    let mut clients: HashMap<RegionId, Arc<MemoryCloud>> = HashMap::new();
    clients.insert(region.clone(), Arc::new(MemoryCloud::new(region)));
    manager_for(stack, "dev".to_string(), clients)
}

/// Test: deploy refuses to run before check-previous completed.
#[tokio::test]
async fn deploy_requires_check_previous() {
    let mut manager = manager();
    let ctx = support::context(RunMode::Deploy, &support::quick_options());

    let result = manager.deploy(&ctx).await;
    assert!(matches!(result, Err(DeployError::StepNotReady { .. })));
}

/// Test: phases unlock one at a time as their predecessors complete.
#[tokio::test]
async fn phases_unlock_in_order() {
    let mut manager = manager();
    let ctx = support::context(RunMode::Deploy, &support::quick_options());

    assert!(matches!(
        manager.health_checking(&ctx).await,
        Err(DeployError::StepNotReady { .. })
    ));

    manager.check_previous_resources(&ctx).await.unwrap();
    assert!(matches!(
        manager.health_checking(&ctx).await,
        Err(DeployError::StepNotReady { .. })
    ));

    manager.deploy(&ctx).await.unwrap();
    assert!(manager.health_checking(&ctx).await.is_ok());
}

/// Test: skipping the deploy steps unlocks the cleanup side without
/// marking the cleanup steps themselves.
#[tokio::test]
async fn skip_unlocks_cleanup_side() {
    let mut manager = manager();
    let ctx = support::context(RunMode::Delete, &support::quick_options());

    manager.check_previous_resources(&ctx).await.unwrap();
    manager.skip_deploy_step();

    assert!(manager.trigger_lifecycle_callbacks(&ctx).await.is_ok());
    assert!(manager.clean_previous_version(&ctx).await.is_ok());
    assert!(manager.clean_checking(&ctx).await.is_ok());
    assert!(manager.gather_metrics(&ctx).await.is_ok());
}
