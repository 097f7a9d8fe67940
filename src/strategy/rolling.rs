// ABOUTME: Rolling-update strategy: step the new group up and the old down.
// ABOUTME: Converges on the target capacity without ever overshooting it.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::cloud::CloudOps;
use crate::config::{Capacity, RunContext, StrategyKind};
use crate::deploy::{
    DeployError, Deployer, Step, decide_capacity, next_rolling_capacity, shrink_capacity,
};
use crate::types::RegionId;

use super::DeployManager;

/// Steps the new group's capacity toward a target in fixed increments,
/// health-checking after every step, while stepping every previous group
/// down by the same increment once per outer iteration.
pub struct RollingUpdate<C> {
    core: Deployer<C>,
    /// Stepping target per region, decided at deploy time.
    targets: HashMap<RegionId, Capacity>,
    /// Whether the previous groups of a region are fully reduced. Once
    /// true the step-down is never retried.
    previous_finished: HashMap<RegionId, bool>,
}

impl<C: CloudOps> RollingUpdate<C> {
    pub fn new(core: Deployer<C>) -> Self {
        RollingUpdate {
            core,
            targets: HashMap::new(),
            previous_finished: HashMap::new(),
        }
    }

    /// One step-down round for every previous group of the region.
    /// Returns whether all previous groups have reached zero.
    async fn shrink_previous_once(
        &mut self,
        region: &RegionId,
        step: u32,
    ) -> Result<bool, DeployError> {
        let shrinks: Vec<(String, Capacity)> = self
            .core
            .state(region)
            .previous_capacities
            .iter()
            .filter(|(_, capacity)| **capacity != Capacity::ZERO)
            .map(|(group, capacity)| (group.clone(), shrink_capacity(*capacity, step)))
            .collect();

        for (group, next) in &shrinks {
            debug!(group = group.as_str(), %next, %region, "stepping previous group down");
            self.core.resize(region, group, *next).await?;
        }

        {
            let state = self.core.state_mut(region);
            for (group, next) in shrinks {
                state.previous_capacities.insert(group, next);
            }
        }

        let done = self
            .core
            .state(region)
            .previous_capacities
            .values()
            .all(|capacity| *capacity == Capacity::ZERO);

        if done {
            info!(%region, "previous groups fully reduced");
            self.previous_finished.insert(region.clone(), true);
        }

        Ok(done)
    }

    /// Run the stepping loop for one region until the new group sits at
    /// the target capacity and the previous groups are fully reduced.
    async fn step_region(&mut self, region: &RegionId, ctx: &RunContext) -> Result<(), DeployError> {
        let step = self.core.stack().rolling_step;
        let target = *self
            .targets
            .get(region)
            .ok_or_else(|| DeployError::Config(format!("no stepping target for region {region}")))?;

        let (group, mut current, target_groups) = {
            let state = self.core.state(region);
            let Some(group) = state.current_name.clone() else {
                return Ok(());
            };
            let current = state.applied_capacity.ok_or_else(|| {
                DeployError::Config(format!("no applied capacity recorded for {group}"))
            })?;
            (group, current, state.manifest.target_groups.clone())
        };

        // The group was created at the first step's capacity; health-check
        // that step before taking the next one.
        self.core
            .wait_until_healthy(region, &group, &target_groups, current.desired, ctx)
            .await?;

        let mut previous_done = *self.previous_finished.get(region).unwrap_or(&false)
            || self.core.state(region).previous_capacities.is_empty();

        loop {
            let capacity_reached = current == target;
            if capacity_reached && previous_done {
                break;
            }

            if !previous_done {
                previous_done = self.shrink_previous_once(region, step).await?;
            }

            if !capacity_reached {
                let next = next_rolling_capacity(current, target, step);
                self.core
                    .notify(ctx, &format!("resizing {group} in {region} to {next}"))
                    .await;
                self.core.resize(region, &group, next).await?;
                self.core.state_mut(region).applied_capacity = Some(next);
                current = next;

                self.core
                    .wait_until_healthy(region, &group, &target_groups, next.desired, ctx)
                    .await?;
            }
        }

        self.core
            .notify(
                ctx,
                &format!("{group} in {region} reached target capacity {target}"),
            )
            .await;
        Ok(())
    }
}

#[async_trait]
impl<C: CloudOps + 'static> DeployManager for RollingUpdate<C> {
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

        let step = self.core.stack().rolling_step;
        for region in self.core.regions_in_scope(ctx) {
            let previous = self.core.state(&region).previous_capacity;
            // The decided capacity is the stepping target, never applied
            // directly.
            let target = decide_capacity(
                StrategyKind::RollingUpdate,
                ctx.force_manifest_capacity,
                false,
                previous,
                self.core.stack().capacity,
            );
            self.targets.insert(region.clone(), target);

            let initial = next_rolling_capacity(Capacity::ZERO, target, step);
            let target_groups = self.core.state(&region).manifest.target_groups.clone();

            let group = self
                .core
                .launch_group(&region, initial, target_groups, Vec::new(), HashMap::new())
                .await?;
            self.core
                .notify(
                    ctx,
                    &format!(
                        "rolling update started: {group} in {region} at {initial}, target {target}"
                    ),
                )
                .await;
        }

        self.core.finish(Step::Deploy);
        Ok(())
    }

    async fn health_checking(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::HealthCheck)?;

        for region in self.core.regions_in_scope(ctx) {
            self.step_region(&region, ctx).await?;
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
        // The stepping loop already brought previous groups to zero in a
        // deploy run; zeroing them again is an idempotent no-op, and the
        // delete pipeline needs it.
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
