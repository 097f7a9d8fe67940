// ABOUTME: Canary strategy: a small parallel slice behind dedicated infrastructure.
// ABOUTME: Start builds the slice; complete promotes it and tears the extras down.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cloud::{
    CloudError, CloudOps, IngressRule, LoadBalancerSpec, SecurityGroupSpec, TemplateSpec,
};
use crate::config::{RunContext, RunMode, StrategyKind};
use crate::deploy::{DeployError, Deployer, Step, decide_capacity, naming, poll_until};
use crate::types::{RegionId, SecurityGroupId};

use super::DeployManager;

/// Runs a smaller-scale resource set attached to a copy of the production
/// target group, optionally behind a dedicated canary load balancer and
/// security group. Completion strips the canary decorations from the slice,
/// promotes it to full scale, and removes the dedicated infrastructure.
pub struct Canary<C> {
    core: Deployer<C>,
    /// Canary target groups discovered per region (earlier canary versions).
    previous_target_groups: HashMap<RegionId, Vec<String>>,
    /// The canary target group this run created or promotes from.
    target_group: HashMap<RegionId, String>,
    /// Dedicated canary load balancer per region.
    load_balancer: HashMap<RegionId, String>,
    /// Security group the canary load balancer fronts traffic with.
    lb_security_group: HashMap<RegionId, SecurityGroupId>,
}

impl<C: CloudOps> Canary<C> {
    pub fn new(core: Deployer<C>) -> Self {
        Canary {
            core,
            previous_target_groups: HashMap::new(),
            target_group: HashMap::new(),
            load_balancer: HashMap::new(),
            lb_security_group: HashMap::new(),
        }
    }

    /// Completing a canary that was never started is a validation error,
    /// decided from provider state discovered in check-previous.
    fn validate_canary_deployment(&self, region: &RegionId) -> Result<String, DeployError> {
        let state = self.core.state(region);
        if !state.canary_started {
            return Err(DeployError::CanaryNotStarted(region.to_string()));
        }
        state
            .canary_group
            .clone()
            .ok_or_else(|| DeployError::CanaryNotStarted(region.to_string()))
    }

    /// Find-or-create the canary security group. A duplicate-creation error
    /// from the provider means another run won the race; resolve it with a
    /// follow-up lookup.
    async fn ensure_security_group(
        client: &Arc<C>,
        name: &str,
    ) -> Result<SecurityGroupId, DeployError> {
        if let Some(id) = client
            .find_security_group(name)
            .await
            .map_err(CloudError::from)?
        {
            return Ok(id);
        }

        let spec = SecurityGroupSpec {
            name: name.to_string(),
            description: "canary validation traffic".to_string(),
            ingress: vec![IngressRule {
                port: 443,
                cidr: "0.0.0.0/0".to_string(),
            }],
        };

        match client.create_security_group(&spec).await {
            Ok(id) => Ok(id),
            Err(e) => {
                let e = CloudError::from(e);
                if e.is_already_exists() {
                    client
                        .find_security_group(name)
                        .await
                        .map_err(CloudError::from)?
                        .ok_or_else(|| {
                            DeployError::Config(format!(
                                "security group {name} reported existing but cannot be found"
                            ))
                        })
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Find-or-create the dedicated canary load balancer.
    async fn ensure_load_balancer(
        client: &Arc<C>,
        name: &str,
        subnets: Vec<String>,
        security_group: SecurityGroupId,
    ) -> Result<(), DeployError> {
        if client
            .describe_load_balancer(name)
            .await
            .map_err(CloudError::from)?
            .is_some()
        {
            debug!(load_balancer = name, "reusing existing canary load balancer");
            return Ok(());
        }

        let spec = LoadBalancerSpec {
            name: name.to_string(),
            subnets,
            security_groups: vec![security_group],
        };

        match client.create_load_balancer(&spec).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let e = CloudError::from(e);
                if e.is_already_exists() { Ok(()) } else { Err(e.into()) }
            }
        }
    }

    async fn start_canary(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        for region in self.core.regions_in_scope(ctx) {
            let client = self.core.client(&region);
            let (prefix, subnets, source) = {
                let state = self.core.state(&region);
                let source = state.manifest.target_groups.first().cloned().ok_or_else(|| {
                    DeployError::Config(format!(
                        "stack {} region {} has no production target group to copy",
                        self.core.stack_name(),
                        region
                    ))
                })?;
                (state.prefix.clone(), state.manifest.subnets.clone(), source)
            };

            let sg_name = naming::canary_security_group_name(&prefix);
            let security_group = Self::ensure_security_group(&client, &sg_name).await?;
            self.core.state_mut(&region).canary_security_group = Some(security_group.clone());

            let lb_name = naming::canary_load_balancer_name(&prefix);
            Self::ensure_load_balancer(&client, &lb_name, subnets, security_group.clone()).await?;
            self.load_balancer.insert(region.clone(), lb_name);
            self.lb_security_group.insert(region.clone(), security_group);

            // Next canary version from the target groups seen so far.
            let existing = self
                .previous_target_groups
                .get(&region)
                .map(|v| v.as_slice())
                .unwrap_or_default();
            let version =
                naming::check_canary_version(existing.iter().map(|s| s.as_str())) + 1;
            let tg_name = naming::canary_target_group_name(&prefix, version);

            let target_group = match client.copy_target_group(&source, &tg_name).await {
                Ok(tg) => tg.name,
                Err(e) => {
                    let e = CloudError::from(e);
                    if e.is_already_exists() {
                        tg_name.clone()
                    } else {
                        return Err(e.into());
                    }
                }
            };
            self.target_group.insert(region.clone(), target_group.clone());

            let previous = self.core.state(&region).previous_capacity;
            let capacity = decide_capacity(
                StrategyKind::Canary,
                ctx.force_manifest_capacity,
                false,
                previous,
                self.core.stack().capacity,
            );

            let mut tags = HashMap::new();
            tags.insert(naming::CANARY_TAG.to_string(), "true".to_string());

            let group = self
                .core
                .launch_group(
                    &region,
                    capacity,
                    vec![target_group],
                    vec![sg_name],
                    tags,
                )
                .await?;
            self.core.state_mut(&region).canary_started = true;

            self.core
                .notify(
                    ctx,
                    &format!("canary started: {group} in {region} at capacity {capacity}"),
                )
                .await;
        }

        Ok(())
    }

    /// Promote the canary slice to production full scale.
    async fn complete_canary(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        for region in self.core.regions_in_scope(ctx) {
            let promote = self.validate_canary_deployment(&region)?;
            let client = self.core.client(&region);
            let prefix = self.core.state(&region).prefix.clone();

            // Detach the canary security group from every network interface
            // of the promoted group's instances.
            let sg_name = naming::canary_security_group_name(&prefix);
            if let Some(security_group) = client
                .find_security_group(&sg_name)
                .await
                .map_err(CloudError::from)?
            {
                let instances = client
                    .describe_instances(&promote)
                    .await
                    .map_err(CloudError::from)?;
                let interfaces: Vec<String> = instances
                    .iter()
                    .flat_map(|i| i.network_interfaces.iter().cloned())
                    .collect();
                if !interfaces.is_empty() {
                    client
                        .detach_from_interfaces(&security_group, &interfaces)
                        .await
                        .map_err(CloudError::from)?;
                }
                self.core.state_mut(&region).canary_security_group = Some(security_group);
            }

            // Strip the canary tag and the canary target-group attachments.
            client
                .untag_group(&promote, naming::CANARY_TAG)
                .await
                .map_err(CloudError::from)?;
            for target_group in self
                .previous_target_groups
                .get(&region)
                .cloned()
                .unwrap_or_default()
            {
                if let Err(e) = client.detach_target_group(&promote, &target_group).await {
                    let e = CloudError::from(e);
                    if !e.is_not_found() {
                        return Err(e.into());
                    }
                }
            }

            // Attach the production target groups.
            let production = self.core.state(&region).manifest.target_groups.clone();
            for target_group in &production {
                client
                    .attach_target_group(&promote, target_group)
                    .await
                    .map_err(CloudError::from)?;
            }

            // Rotate the launch template to a version without the canary
            // security group.
            let template = naming::template_name(&promote, Utc::now());
            let manifest = self.core.state(&region).manifest.clone();
            let spec = TemplateSpec {
                name: template.clone(),
                image: manifest.image,
                instance_type: manifest.instance_type,
                security_groups: manifest.security_groups,
                user_data: manifest.user_data,
            };
            client.create_template(&spec).await.map_err(CloudError::from)?;
            client
                .set_launch_template(&promote, &template)
                .await
                .map_err(CloudError::from)?;

            // Restore full-scale capacity inherited from the pre-canary
            // resource.
            let previous = self.core.state(&region).previous_capacity;
            let capacity = decide_capacity(
                StrategyKind::Canary,
                ctx.force_manifest_capacity,
                true,
                previous,
                self.core.stack().capacity,
            );
            self.core.resize(&region, &promote, capacity).await?;

            {
                let version = naming::parse_version(&prefix, &promote);
                let state = self.core.state_mut(&region);
                state.current_name = Some(promote.clone());
                state.current_version = version;
                state.current_template = Some(template);
                state.applied_capacity = Some(capacity);
            }

            info!(group = promote.as_str(), %region, %capacity, "canary promoted");
            self.core
                .notify(
                    ctx,
                    &format!("canary completed: {promote} in {region} resized to {capacity}"),
                )
                .await;
        }

        Ok(())
    }

    /// Tear down the canary load balancer (waiting for provider-side
    /// deletion), its security group, and orphaned canary target groups.
    async fn teardown_canary_infra(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        for region in self.core.regions_in_scope(ctx) {
            let client = self.core.client(&region);
            let prefix = self.core.state(&region).prefix.clone();

            let lb_name = self
                .load_balancer
                .get(&region)
                .cloned()
                .unwrap_or_else(|| naming::canary_load_balancer_name(&prefix));
            if client
                .describe_load_balancer(&lb_name)
                .await
                .map_err(CloudError::from)?
                .is_some()
            {
                if let Err(e) = client.delete_load_balancer(&lb_name).await {
                    let e = CloudError::from(e);
                    if !e.is_not_found() {
                        return Err(e.into());
                    }
                }

                let what = format!("canary load balancer {lb_name} to be deleted");
                let poll_client = client.clone();
                let poll_name = lb_name.clone();
                poll_until(&what, ctx.timeout, ctx.poll_interval, move || {
                    let client = poll_client.clone();
                    let name = poll_name.clone();
                    async move {
                        let described = client
                            .describe_load_balancer(&name)
                            .await
                            .map_err(CloudError::from)?;
                        Ok(described.is_none())
                    }
                })
                .await?;
                info!(load_balancer = lb_name.as_str(), %region, "canary load balancer deleted");
            }

            let security_group = match self.lb_security_group.get(&region) {
                Some(security_group) => Some(security_group.clone()),
                None => {
                    let sg_name = naming::canary_security_group_name(&prefix);
                    client
                        .find_security_group(&sg_name)
                        .await
                        .map_err(CloudError::from)?
                }
            };
            if let Some(security_group) = security_group {
                if let Err(e) = client.delete_security_group(&security_group).await {
                    let e = CloudError::from(e);
                    if !e.is_not_found() {
                        return Err(e.into());
                    }
                }
            }

            // Orphaned canary target groups: everything bearing the marker.
            let target_groups = client
                .list_target_groups(&prefix)
                .await
                .map_err(CloudError::from)?;
            for target_group in target_groups {
                if naming::parse_canary_version(&target_group.name).is_none() {
                    continue;
                }
                if let Err(e) = client.delete_target_group(&target_group.name).await {
                    let e = CloudError::from(e);
                    if !e.is_not_found() {
                        return Err(e.into());
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether this run removes previous resources and canary infrastructure.
    fn cleans_up(&self, ctx: &RunContext) -> bool {
        ctx.mode == RunMode::Delete || ctx.complete_canary
    }
}

#[async_trait]
impl<C: CloudOps + 'static> DeployManager for Canary<C> {
    fn stack_name(&self) -> &str {
        self.core.stack_name()
    }

    async fn check_previous_resources(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::CheckPrevious)?;
        self.core.discover_previous(ctx).await?;

        for region in self.core.regions_in_scope(ctx) {
            let client = self.core.client(&region);
            let prefix = self.core.state(&region).prefix.clone();

            let target_groups = client
                .list_target_groups(&prefix)
                .await
                .map_err(CloudError::from)?;
            let canary_target_groups: Vec<String> = target_groups
                .iter()
                .filter(|tg| naming::parse_canary_version(&tg.name).is_some())
                .map(|tg| tg.name.clone())
                .collect();

            let version =
                naming::check_canary_version(canary_target_groups.iter().map(|s| s.as_str()));
            if version > 0 {
                self.core.state_mut(&region).canary_started = true;
                self.target_group
                    .insert(region.clone(), naming::canary_target_group_name(&prefix, version));
            }
            self.previous_target_groups
                .insert(region.clone(), canary_target_groups);
        }

        self.core.finish(Step::CheckPrevious);
        Ok(())
    }

    async fn deploy(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::Deploy)?;

        if ctx.complete_canary {
            self.complete_canary(ctx).await?;
        } else {
            self.start_canary(ctx).await?;
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
                let desired = state.applied_capacity.map(|c| c.desired).unwrap_or(0);
                let target_groups = if ctx.complete_canary {
                    state.manifest.target_groups.clone()
                } else {
                    let canary_tg = self.target_group.get(&region).cloned().ok_or_else(|| {
                        DeployError::Config(format!("no canary target group recorded for {region}"))
                    })?;
                    vec![canary_tg]
                };
                (group, desired, target_groups)
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

        // Scaling policies and alarms belong to the promoted production
        // group; a temporary canary slice keeps its fixed size.
        if ctx.complete_canary {
            self.core.additional_work(ctx).await?;
        } else {
            debug!(stack = self.core.stack_name(), "canary slice skips scaling policies");
        }

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

        // A canary-start run leaves production running next to the slice;
        // only completion and deletion clean up.
        if self.cleans_up(ctx) {
            self.core.zero_out_previous(ctx).await?;
        } else {
            debug!(
                stack = self.core.stack_name(),
                "canary start leaves previous versions running"
            );
        }

        self.core.finish(Step::CleanPrevious);
        Ok(())
    }

    async fn clean_checking(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        self.core.gate(Step::CleanChecking)?;

        if self.cleans_up(ctx) {
            self.core.wait_until_drained(ctx).await?;
            self.teardown_canary_infra(ctx).await?;
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
