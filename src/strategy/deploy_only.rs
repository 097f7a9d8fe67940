// ABOUTME: Deploy-only strategy: new version, settle delay, no cutover semantics.
// ABOUTME: Previous versions stay up for manual rollback; only delete removes them.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::cloud::CloudOps;
use crate::config::{RunContext, RunMode, StrategyKind};
use crate::deploy::{DeployError, Deployer, Step, decide_capacity};

use super::DeployManager;

/// Creates a new resource version with no blue-green or canary cutover.
/// Instead of active health polling the new instances are assumed ready
/// after a fixed settle delay.
pub struct DeployOnly<C> {
    core: Deployer<C>,
}

impl<C: CloudOps> DeployOnly<C> {
    pub fn new(core: Deployer<C>) -> Self {
        DeployOnly { core }
    }
}

#[async_trait]
impl<C: CloudOps + 'static> DeployManager for DeployOnly<C> {
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
                StrategyKind::DeployOnly,
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

        // No active polling: the new instances are assumed ready after the
        // manifest's settle delay.
        let settle = self.core.stack().settle_delay;
        debug!(stack = self.core.stack_name(), ?settle, "waiting for settle delay");
        tokio::time::sleep(settle).await;

        self.core
            .notify(
                ctx,
                &format!(
                    "{} settled after {:?}, assuming healthy",
                    self.core.stack_name(),
                    settle
                ),
            )
            .await;

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

        // Previous versions are only deletable when cleanup is explicitly
        // requested, which is the delete pipeline. A deploy run keeps them
        // as the manual-rollback path.
        if ctx.mode == RunMode::Delete {
            self.core.zero_out_previous(ctx).await?;
        } else {
            debug!(
                stack = self.core.stack_name(),
                "deploy-only keeps previous versions for manual rollback"
            );
        }

        self.core.finish(Step::CleanPrevious);
        Ok(())
    }

    async fn clean_checking(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::CleanChecking)?;
        if ctx.mode == RunMode::Delete {
            self.core.wait_until_drained(ctx).await?;
        }
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
