// ABOUTME: Blue-green strategy: a full parallel resource set at the next version.
// ABOUTME: Previous versions are zeroed out, drained, and deleted after cutover.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::cloud::CloudOps;
use crate::config::{RunContext, StrategyKind};
use crate::deploy::{DeployError, Deployer, Step, decide_capacity};

use super::DeployManager;

/// Creates an entirely new launch template + group at the next version,
/// health-checks the new group only, then drains and deletes every
/// previous version.
pub struct BlueGreen<C> {
    core: Deployer<C>,
}

impl<C: CloudOps> BlueGreen<C> {
    pub fn new(core: Deployer<C>) -> Self {
        BlueGreen { core }
    }

    pub fn core(&self) -> &Deployer<C> {
        &self.core
    }
}

#[async_trait]
impl<C: CloudOps + 'static> DeployManager for BlueGreen<C> {
    fn stack_name(&self) -> &str {
        self.core.stack_name()
    }

    async fn check_previous_resources(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::CheckPrevious)?;
        self.core.discover_previous(ctx).await?;
        self.core.finish(Step::CheckPrevious);
        Ok(())
    }

    async fn deploy(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::Deploy)?;

        for region in self.core.regions_in_scope(ctx) {
            let previous = self.core.state(&region).previous_capacity;
            let capacity = decide_capacity(
                StrategyKind::BlueGreen,
                ctx.force_manifest_capacity,
                false,
                previous,
                self.core.stack().capacity,
            );
            let target_groups = self.core.state(&region).manifest.target_groups.clone();

            let group = self
                .core
                .launch_group(&region, capacity, target_groups, Vec::new(), HashMap::new())
                .await?;
            self.core
                .notify(
                    ctx,
                    &format!("deployment started: {group} in {region} at capacity {capacity}"),
                )
                .await;
        }

        self.core.finish(Step::Deploy);
        Ok(())
    }

    async fn health_checking(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::HealthCheck)?;

        for region in self.core.regions_in_scope(ctx) {
            let (group, desired, target_groups) = {
                let state = self.core.state(&region);
                let Some(group) = state.current_name.clone() else {
                    continue;
                };
                (
                    group,
                    state.applied_capacity.map(|c| c.desired).unwrap_or(0),
                    state.manifest.target_groups.clone(),
                )
            };

            self.core
                .wait_until_healthy(&region, &group, &target_groups, desired, ctx)
                .await?;
            self.core
                .notify(ctx, &format!("{group} in {region} is healthy ({desired} targets)"))
                .await;
        }

        self.core.finish(Step::HealthCheck);
        Ok(())
    }

    async fn finish_additional_work(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::AdditionalWork)?;
        self.core.additional_work(ctx).await?;
        self.core.finish(Step::AdditionalWork);
        Ok(())
    }

    async fn trigger_lifecycle_callbacks(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::LifecycleCallbacks)?;
        self.core.run_lifecycle_callbacks(ctx).await?;
        self.core.finish(Step::LifecycleCallbacks);
        Ok(())
    }

    async fn clean_previous_version(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::CleanPrevious)?;
        self.core.zero_out_previous(ctx).await?;
        self.core.finish(Step::CleanPrevious);
        Ok(())
    }

    async fn clean_checking(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::CleanChecking)?;
        self.core.wait_until_drained(ctx).await?;
        self.core.finish(Step::CleanChecking);
        Ok(())
    }

    async fn gather_metrics(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::GatherMetrics)?;
        self.core.gather(ctx).await?;
        self.core.finish(Step::GatherMetrics);
        Ok(())
    }

    async fn run_api_test(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::ApiTest)?;
        self.core.api_test(ctx).await?;
        self.core.finish(Step::ApiTest);
        Ok(())
    }

    fn skip_deploy_step(&mut self) {
        self.core.status_mut().skip_deploy_steps();
    }
}
