// ABOUTME: Shared helpers for integration tests.
// ABOUTME: Builds manifests, run contexts, and in-memory fleets.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nonempty::NonEmpty;

use armada::config::{
    Capacity, Manifest, RegionManifest, RunContext, RunMode, RunOptions, Stack, StrategyKind,
};
use armada::metrics::NoopMetrics;
use armada::notify::NoopNotifier;
use armada::types::{RegionId, StackName};

pub fn region(id: &str) -> RegionId {
    RegionId::new(id).expect("valid region id")
}

/// A region manifest with one production target group named `<stack>-tg`.
pub fn region_manifest(stack: &str, id: &str) -> RegionManifest {
    RegionManifest {
        region: region(id),
        instance_type: "m5.large".to_string(),
        image: "image-0123456789abcdef0".to_string(),
        subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
        security_groups: vec![format!("{stack}-sg")],
        target_groups: vec![format!("{stack}-tg")],
        load_balancer: Some(format!("{stack}-lb")),
        scaling_policies: vec![],
        alarms: vec![],
        user_data: None,
    }
}

pub fn stack(name: &str, strategy: StrategyKind, regions: &[&str]) -> Stack {
    let regions: Vec<RegionManifest> = regions
        .iter()
        .map(|id| region_manifest(name, id))
        .collect();

    Stack {
        name: StackName::new(name).expect("valid stack name"),
        strategy,
        capacity: Capacity {
            min: 1,
            desired: 2,
            max: 4,
        },
        rolling_step: 1,
        settle_delay: Duration::from_millis(10),
        regions: NonEmpty::from_vec(regions).expect("at least one region"),
        api_test: false,
        tags: HashMap::new(),
    }
}

pub fn manifest(stacks: Vec<Stack>) -> Manifest {
    Manifest {
        env: "dev".to_string(),
        stacks: NonEmpty::from_vec(stacks).expect("at least one stack"),
    }
}

/// Options with short polling so paused-clock tests advance quickly.
pub fn quick_options() -> RunOptions {
    RunOptions {
        timeout: Duration::from_secs(300),
        poll_interval: Duration::from_secs(1),
        ..RunOptions::default()
    }
}

pub fn context(mode: RunMode, options: &RunOptions) -> RunContext {
    RunContext::new(
        mode,
        options,
        Arc::new(NoopNotifier),
        Arc::new(NoopMetrics),
        None,
    )
    .expect("valid run context")
}
