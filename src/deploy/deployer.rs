// ABOUTME: Per-stack deployer core shared by all strategies.
// ABOUTME: Owns per-region state and the provider-facing primitives.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::callbacks::{CallbackContext, CallbackPoint};
use crate::cloud::{AlarmSpec, CloudError, CloudOps, GroupSpec, ScalingPolicySpec, TemplateSpec};
use crate::config::{Capacity, RegionManifest, RunContext, RunMode, Stack};
use crate::metrics::{DeploymentRecord, RegionRecord};
use crate::notify::send_best_effort;
use crate::types::{InstanceId, RegionId, SecurityGroupId};

use super::error::DeployError;
use super::naming;
use super::polling::poll_until;
use super::retry::resize_with_retry;
use super::status::{Step, StepStatus};

/// Everything the deployer knows about one region.
///
/// Exclusively owned (through the deployer and its strategy wrapper) by one
/// pipeline worker, so no locking is needed.
#[derive(Debug)]
pub struct RegionState {
    /// Immutable per-region manifest data.
    pub manifest: RegionManifest,
    /// Naming root for every versioned resource in this region.
    pub prefix: String,
    /// Version the next created group gets.
    pub next_version: u32,
    /// Group created (or promoted) by this run.
    pub current_name: Option<String>,
    pub current_version: Option<u32>,
    pub current_template: Option<String>,
    /// Capacity applied to the current group.
    pub applied_capacity: Option<Capacity>,
    /// Same-prefix groups that predate this run.
    pub previous_names: Vec<String>,
    pub previous_versions: Vec<u32>,
    pub previous_instance_ids: Vec<InstanceId>,
    /// Launch template per previous group, deleted together with it.
    pub previous_templates: HashMap<String, String>,
    /// Live capacity per previous group, the rolling-update step-down input.
    pub previous_capacities: HashMap<String, Capacity>,
    /// Live capacity of the most recent previous group.
    pub previous_capacity: Option<Capacity>,
    /// Most recent previous group name.
    pub latest_name: Option<String>,
    /// Canary-tagged group discovered in this region, if any.
    pub canary_group: Option<String>,
    pub canary_started: bool,
    pub canary_security_group: Option<SecurityGroupId>,
    /// Previous groups already drained and deleted.
    pub deleted: HashSet<String>,
}

impl RegionState {
    fn new(manifest: RegionManifest, prefix: String) -> Self {
        RegionState {
            manifest,
            prefix,
            next_version: 0,
            current_name: None,
            current_version: None,
            current_template: None,
            applied_capacity: None,
            previous_names: Vec::new(),
            previous_versions: Vec::new(),
            previous_instance_ids: Vec::new(),
            previous_templates: HashMap::new(),
            previous_capacities: HashMap::new(),
            previous_capacity: None,
            latest_name: None,
            canary_group: None,
            canary_started: false,
            canary_security_group: None,
            deleted: HashSet::new(),
        }
    }
}

/// Per-stack deployment core.
///
/// Strategies wrap exactly one deployer and drive these primitives through
/// the phase contract. The deployer holds one provider client per region.
pub struct Deployer<C> {
    stack: Stack,
    env: String,
    clients: HashMap<RegionId, Arc<C>>,
    states: BTreeMap<RegionId, RegionState>,
    status: StepStatus,
}

impl<C: CloudOps> Deployer<C> {
    pub fn new(stack: Stack, env: String, clients: HashMap<RegionId, Arc<C>>) -> Self {
        let mut states = BTreeMap::new();
        for region in stack.regions.iter() {
            let prefix = naming::resource_prefix(&stack.name, &env, &region.region);
            states.insert(
                region.region.clone(),
                RegionState::new(region.clone(), prefix),
            );
        }

        Deployer {
            stack,
            env,
            clients,
            states,
            status: StepStatus::new(),
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_name(&self) -> &str {
        self.stack.name.as_str()
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn state(&self, region: &RegionId) -> &RegionState {
        self.states
            .get(region)
            .expect("region registered at construction")
    }

    pub fn state_mut(&mut self, region: &RegionId) -> &mut RegionState {
        self.states
            .get_mut(region)
            .expect("region registered at construction")
    }

    pub(crate) fn client(&self, region: &RegionId) -> Arc<C> {
        self.clients
            .get(region)
            .expect("client registered at construction")
            .clone()
    }

    /// Regions of this stack participating in the run.
    pub fn regions_in_scope(&self, ctx: &RunContext) -> Vec<RegionId> {
        self.states
            .keys()
            .filter(|region| ctx.region_in_scope(region))
            .cloned()
            .collect()
    }

    pub fn gate(&self, step: Step) -> Result<(), DeployError> {
        self.status.ensure_ready(step)
    }

    pub fn finish(&mut self, step: Step) {
        self.status.complete(step);
    }

    pub fn status(&self) -> &StepStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StepStatus {
        &mut self.status
    }

    pub async fn notify(&self, ctx: &RunContext, message: &str) {
        send_best_effort(ctx.notifier.as_ref(), message).await;
    }

    /// Discover every same-prefix group per region and record it as
    /// previous state; compute the version the next group gets.
    ///
    /// Canary-tagged groups are tracked separately in deploy runs (the
    /// completion path promotes the latest one); the delete pipeline treats
    /// them as previous like everything else.
    pub async fn discover_previous(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        let stack = self.stack.name.clone();
        for region in self.regions_in_scope(ctx) {
            let client = self.client(&region);
            let state = self.state_mut(&region);

            let groups = client
                .list_groups_by_prefix(&state.prefix)
                .await
                .map_err(CloudError::from)?;

            let mut versions = Vec::new();
            let mut latest: Option<(u32, String, Capacity)> = None;
            let mut latest_canary: Option<(u32, String)> = None;

            for group in &groups {
                let Some(version) = naming::parse_version(&state.prefix, &group.name) else {
                    continue;
                };
                versions.push(version);

                let is_canary = group.tags.contains_key(naming::CANARY_TAG);
                if is_canary && ctx.mode == RunMode::Deploy {
                    state.canary_started = true;
                    if latest_canary.as_ref().is_none_or(|(v, _)| version > *v) {
                        latest_canary = Some((version, group.name.clone()));
                    }
                    continue;
                }

                state.previous_names.push(group.name.clone());
                state.previous_versions.push(version);
                state
                    .previous_instance_ids
                    .extend(group.instance_ids.iter().cloned());
                if let Some(template) = &group.launch_template {
                    state
                        .previous_templates
                        .insert(group.name.clone(), template.clone());
                }
                state
                    .previous_capacities
                    .insert(group.name.clone(), group.capacity);

                if !is_canary && latest.as_ref().is_none_or(|(v, _, _)| version > *v) {
                    latest = Some((version, group.name.clone(), group.capacity));
                }
            }

            state.next_version = naming::next_version(versions);
            if let Some((_, name, capacity)) = latest {
                state.latest_name = Some(name);
                state.previous_capacity = Some(capacity);
            }
            state.canary_group = latest_canary.map(|(_, name)| name);

            debug!(
                stack = stack.as_str(),
                %region,
                previous = state.previous_names.len(),
                next_version = state.next_version,
                canary_started = state.canary_started,
                "discovered previous resources"
            );
        }

        Ok(())
    }

    /// Create the launch template and group for this run's version.
    pub async fn launch_group(
        &mut self,
        region: &RegionId,
        capacity: Capacity,
        target_groups: Vec<String>,
        extra_security_groups: Vec<String>,
        extra_tags: HashMap<String, String>,
    ) -> Result<String, DeployError> {
        let client = self.client(region);
        let mut tags = self.stack.tags.clone();
        tags.extend(extra_tags);

        let state = self.state_mut(region);
        let version = state.next_version;
        let group = naming::group_name(&state.prefix, version);
        let template = naming::template_name(&group, Utc::now());

        let mut security_groups = state.manifest.security_groups.clone();
        security_groups.extend(extra_security_groups);

        let template_spec = TemplateSpec {
            name: template.clone(),
            image: state.manifest.image.clone(),
            instance_type: state.manifest.instance_type.clone(),
            security_groups,
            user_data: state.manifest.user_data.clone(),
        };
        client
            .create_template(&template_spec)
            .await
            .map_err(CloudError::from)?;

        let group_spec = GroupSpec {
            name: group.clone(),
            launch_template: template.clone(),
            capacity,
            subnets: state.manifest.subnets.clone(),
            target_groups,
            tags,
        };
        client
            .create_group(&group_spec)
            .await
            .map_err(CloudError::from)?;

        state.current_name = Some(group.clone());
        state.current_version = Some(version);
        state.current_template = Some(template);
        state.applied_capacity = Some(capacity);

        info!(%group, %capacity, %region, "created group");
        Ok(group)
    }

    /// Count the group's instances reporting healthy in every given target
    /// group. With no target groups the live instance count is used.
    pub async fn healthy_target_count(
        &self,
        region: &RegionId,
        group: &str,
        target_groups: &[String],
    ) -> Result<u32, DeployError> {
        let client = self.client(region);
        let instances = client
            .describe_instances(group)
            .await
            .map_err(CloudError::from)?;

        if target_groups.is_empty() {
            return Ok(instances.len() as u32);
        }

        let mut healthy: HashSet<String> = instances
            .iter()
            .map(|i| i.id.as_str().to_string())
            .collect();

        for target_group in target_groups {
            let health = client
                .target_health(target_group)
                .await
                .map_err(CloudError::from)?;
            let reported: HashSet<String> = health
                .iter()
                .filter(|h| h.healthy)
                .map(|h| h.instance.as_str().to_string())
                .collect();
            healthy.retain(|id| reported.contains(id));
        }

        Ok(healthy.len() as u32)
    }

    /// Poll until the group reports at least `desired` healthy targets.
    pub async fn wait_until_healthy(
        &self,
        region: &RegionId,
        group: &str,
        target_groups: &[String],
        desired: u32,
        ctx: &RunContext,
    ) -> Result<(), DeployError> {
        let what = format!("{group} to report {desired} healthy targets");
        poll_until(&what, ctx.timeout, ctx.poll_interval, move || {
            let this = self;
            async move {
                let healthy = this.healthy_target_count(region, group, target_groups).await?;
                debug!(group, healthy, desired, "health check");
                Ok(healthy >= desired)
            }
        })
        .await
    }

    /// Resize a group with bounded retry.
    pub async fn resize(
        &self,
        region: &RegionId,
        group: &str,
        capacity: Capacity,
    ) -> Result<(), DeployError> {
        let client = self.client(region);
        resize_with_retry(client.as_ref(), group, capacity).await
    }

    /// Degenerate resize draining a group before deletion.
    pub async fn zero_out(&self, region: &RegionId, group: &str) -> Result<(), DeployError> {
        self.resize(region, group, Capacity::ZERO).await
    }

    /// Zero out every previous group of every in-scope region.
    pub async fn zero_out_previous(&self, ctx: &RunContext) -> Result<(), DeployError> {
        for region in self.regions_in_scope(ctx) {
            let previous = self.state(&region).previous_names.clone();
            for group in previous {
                self.notify(ctx, &format!("draining previous group {group} in {region}"))
                    .await;
                self.zero_out(&region, &group).await?;
            }
        }
        Ok(())
    }

    /// One drain round: delete every previous group whose instances are
    /// gone (and its launch template). Returns whether all are deleted.
    async fn drain_region_once(&mut self, region: &RegionId) -> Result<bool, DeployError> {
        let client = self.client(region);
        let pending: Vec<String> = {
            let state = self.state(region);
            state
                .previous_names
                .iter()
                .filter(|name| !state.deleted.contains(*name))
                .cloned()
                .collect()
        };

        let mut all_drained = true;
        for group in pending {
            let live = match client.describe_instances(&group).await {
                Ok(instances) => instances.len(),
                Err(e) => {
                    let e = CloudError::from(e);
                    // A group that vanished between rounds counts as drained.
                    if e.is_not_found() { 0 } else { return Err(e.into()) }
                }
            };

            if live > 0 {
                debug!(%group, live, %region, "previous group not yet drained");
                all_drained = false;
                continue;
            }

            if let Err(e) = client.delete_group(&group).await {
                let e = CloudError::from(e);
                if !e.is_not_found() {
                    return Err(e.into());
                }
            }

            let template = self.state(region).previous_templates.get(&group).cloned();
            if let Some(template) = template {
                if let Err(e) = client.delete_template(&template).await {
                    let e = CloudError::from(e);
                    if !e.is_not_found() {
                        return Err(e.into());
                    }
                }
            }

            info!(%group, %region, "previous group drained and deleted");
            self.state_mut(region).deleted.insert(group);
        }

        Ok(all_drained)
    }

    /// Poll until every previous group of every in-scope region is drained
    /// and deleted. Same deadline semantics as health polling: the timeout
    /// is checked before sleeping.
    pub async fn wait_until_drained(&mut self, ctx: &RunContext) -> Result<(), DeployError> {
        let regions = self.regions_in_scope(ctx);
        let started = tokio::time::Instant::now();

        loop {
            let mut all = true;
            for region in &regions {
                all &= self.drain_region_once(region).await?;
            }
            if all {
                return Ok(());
            }

            if started.elapsed() > ctx.timeout {
                return Err(DeployError::Timeout {
                    what: format!("previous groups of {} to drain", self.stack_name()),
                    timeout: ctx.timeout,
                });
            }

            tokio::time::sleep(ctx.poll_interval).await;
        }
    }

    /// Attach scaling policies and alarms, and enable metrics collection,
    /// on the current group of every in-scope region.
    pub async fn additional_work(&self, ctx: &RunContext) -> Result<(), DeployError> {
        for region in self.regions_in_scope(ctx) {
            let client = self.client(&region);
            let state = self.state(&region);
            let Some(group) = &state.current_name else {
                continue;
            };

            if !ctx.disable_metrics {
                client
                    .enable_metrics_collection(group)
                    .await
                    .map_err(CloudError::from)?;
            }

            for policy in &state.manifest.scaling_policies {
                let spec = ScalingPolicySpec {
                    name: policy.name.clone(),
                    adjustment: policy.adjustment,
                    cooldown: policy.cooldown,
                };
                client
                    .put_scaling_policy(group, &spec)
                    .await
                    .map_err(CloudError::from)?;
            }

            for alarm in &state.manifest.alarms {
                let spec = AlarmSpec {
                    name: alarm.name.clone(),
                    metric: alarm.metric.clone(),
                    threshold: alarm.threshold,
                    evaluation_periods: alarm.evaluation_periods,
                };
                client
                    .put_alarm(group, &spec)
                    .await
                    .map_err(CloudError::from)?;
            }
        }
        Ok(())
    }

    /// Run the before-clean lifecycle callback, if one is configured.
    /// Callback failures at this point warn rather than abort: cleanup of
    /// already-replaced versions must not be blocked by a reporting script.
    pub async fn run_lifecycle_callbacks(&self, ctx: &RunContext) -> Result<(), DeployError> {
        let Some(runner) = &ctx.callbacks else {
            debug!("no callback runner configured");
            return Ok(());
        };

        let context = CallbackContext {
            stack: self.stack.name.clone(),
            env: self.env.clone(),
            mode: ctx.mode.as_str().to_string(),
            regions: self
                .regions_in_scope(ctx)
                .iter()
                .map(|r| r.to_string())
                .collect(),
            new_version: self
                .states
                .values()
                .find_map(|s| s.current_version.map(|v| format!("v{v:03}"))),
        };

        if let Some(result) = runner.run(CallbackPoint::BeforeClean, &context).await {
            if !result.success {
                warn!(stderr = %result.stderr, "before-clean callback failed");
            }
        }

        Ok(())
    }

    /// Hand the deployment record to the metrics store. Persistence
    /// failures warn rather than abort a deployment that already happened.
    pub async fn gather(&self, ctx: &RunContext) -> Result<(), DeployError> {
        if ctx.disable_metrics {
            debug!("metrics disabled, skipping deployment record");
            return Ok(());
        }

        let record = DeploymentRecord {
            stack: self.stack_name().to_string(),
            env: self.env.clone(),
            mode: ctx.mode.as_str().to_string(),
            strategy: self.stack.strategy.as_str().to_string(),
            started_at: ctx.started_at,
            recorded_at: Utc::now(),
            regions: self
                .regions_in_scope(ctx)
                .iter()
                .map(|region| {
                    let state = self.state(region);
                    RegionRecord {
                        region: region.to_string(),
                        group: state.current_name.clone(),
                        version: state.current_version,
                        previous_groups: state.previous_names.clone(),
                    }
                })
                .collect(),
        };

        if let Err(e) = ctx.metrics.record(&record).await {
            warn!(error = %e, "failed to persist deployment record");
        }

        Ok(())
    }

    /// Run the stack's API test suite, if the manifest opts in and a
    /// runner is configured.
    pub async fn api_test(&self, ctx: &RunContext) -> Result<(), DeployError> {
        if !self.stack.api_test {
            debug!(stack = self.stack_name(), "api test not requested");
            return Ok(());
        }
        let Some(runner) = &ctx.api_test else {
            debug!("no api test runner configured");
            return Ok(());
        };

        let report = runner
            .run(self.stack_name())
            .await
            .map_err(|e| DeployError::ApiTest {
                stack: self.stack_name().to_string(),
                reason: e.to_string(),
            })?;

        if !report.is_success() {
            return Err(DeployError::ApiTest {
                stack: self.stack_name().to_string(),
                reason: format!(
                    "{} of {} checks failed",
                    report.failed,
                    report.failed + report.passed
                ),
            });
        }

        info!(passed = report.passed, "api test suite passed");
        Ok(())
    }
}
