// ABOUTME: Tests for the deploy-only strategy.
// ABOUTME: New versions pile up; only the delete pipeline removes them.

mod support;

use std::sync::Arc;

use armada::cloud::memory::MemoryFleet;
use armada::config::{RunMode, StrategyKind};
use armada::pipeline::Pipeline;

/// Test: deploy-only creates new versions without touching previous ones;
/// repeated deploys accumulate generations for manual rollback.
#[tokio::test(start_paused = true)]
async fn deploy_only_keeps_previous_versions() {
    let stack = support::stack("solo", StrategyKind::DeployOnly, &["us-east-1"]);
    let manifest = support::manifest(vec![stack]);
    let fleet = Arc::new(MemoryFleet::new());
    let cloud = fleet.client(&support::region("us-east-1"));

    for _ in 0..2 {
        let ctx = support::context(RunMode::Deploy, &support::quick_options());
        let pipeline = Pipeline::build(&manifest, |region| Ok(fleet.client(region))).unwrap();
        pipeline.run(&ctx).await.expect("deploy-only run");
    }

    assert_eq!(
        cloud.group_names(),
        vec![
            "solo-dev_useast1-v000".to_string(),
            "solo-dev_useast1-v001".to_string(),
        ]
    );
}

/// Test: the delete pipeline removes every accumulated generation.
#[tokio::test(start_paused = true)]
async fn delete_removes_accumulated_generations() {
    let stack = support::stack("solo", StrategyKind::DeployOnly, &["us-east-1"]);
    let manifest = support::manifest(vec![stack]);
    let fleet = Arc::new(MemoryFleet::new());
    let cloud = fleet.client(&support::region("us-east-1"));

    for _ in 0..2 {
        let ctx = support::context(RunMode::Deploy, &support::quick_options());
        let pipeline = Pipeline::build(&manifest, |region| Ok(fleet.client(region))).unwrap();
        pipeline.run(&ctx).await.expect("deploy-only run");
    }

    let ctx = support::context(RunMode::Delete, &support::quick_options());
    let pipeline = Pipeline::build(&manifest, |region| Ok(fleet.client(region))).unwrap();
    pipeline.run(&ctx).await.expect("delete run");

    assert!(cloud.group_names().is_empty());
}
