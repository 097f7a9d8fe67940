// ABOUTME: In-memory provider implementing the full cloud contract.
// ABOUTME: Backs rehearsal runs and the test suite; nothing leaves the process.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::Capacity;
use crate::types::{InstanceId, LoadBalancerArn, RegionId, SecurityGroupId, TargetGroupArn};

use super::traits::{
    AlarmSpec, BalancingError, BalancingOps, FirewallError, FirewallOps, GroupError, GroupOps,
    GroupSpec, GroupSummary, InstanceSummary, LoadBalancerSpec, LoadBalancerSummary,
    ScalingPolicySpec, SecurityGroupSpec, TargetGroupSummary, TargetHealth, TemplateError,
    TemplateOps, TemplateSpec,
};

#[derive(Debug)]
struct GroupRecord {
    launch_template: String,
    capacity: Capacity,
    target_groups: Vec<String>,
    tags: HashMap<String, String>,
    instances: Vec<InstanceSummary>,
    policies: Vec<ScalingPolicySpec>,
    alarms: Vec<AlarmSpec>,
    metrics_enabled: bool,
}

#[derive(Default)]
struct MemoryState {
    counter: u64,
    templates: HashMap<String, TemplateSpec>,
    groups: HashMap<String, GroupRecord>,
    target_groups: HashMap<String, TargetGroupSummary>,
    load_balancers: HashMap<String, LoadBalancerSummary>,
    lb_delete_delays: HashMap<String, u32>,
    pending_lb_deletes: HashMap<String, u32>,
    security_groups: HashMap<String, SecurityGroupId>,
    detachments: Vec<(SecurityGroupId, Vec<String>)>,
    unhealthy: HashSet<String>,
    health_delays: HashMap<String, u32>,
    resize_failures: HashMap<String, u32>,
}

/// One region's worth of in-memory cloud state.
///
/// Deliberately permissive about resources it has never seen (production
/// target groups, externally managed templates): a rehearsal run starts
/// from an empty region, and anything the manifest references is treated
/// as pre-existing.
pub struct MemoryCloud {
    region: RegionId,
    state: Mutex<MemoryState>,
}

impl MemoryCloud {
    pub fn new(region: RegionId) -> Self {
        MemoryCloud {
            region,
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn region(&self) -> &RegionId {
        &self.region
    }

    fn spawn_instance(&self, state: &mut MemoryState) -> InstanceSummary {
        state.counter += 1;
        let serial = state.counter;
        InstanceSummary {
            id: InstanceId::new(format!("i-{}{serial:08x}", self.region.compact())),
            state: "running".to_string(),
            network_interfaces: vec![format!("eni-{serial:08x}")],
        }
    }

    fn target_group_arn(&self, state: &mut MemoryState, name: &str) -> TargetGroupArn {
        state.counter += 1;
        TargetGroupArn::new(format!(
            "arn:cloud:balancing:{}:targetgroup/{name}/{:016x}",
            self.region, state.counter
        ))
    }

    // ------------------------------------------------------------------
    // Knobs for tests: delayed health, injected failures, slow deletion.
    // ------------------------------------------------------------------

    /// Report zero healthy targets for the next `polls` health queries.
    pub fn hold_health(&self, target_group: &str, polls: u32) {
        self.state
            .lock()
            .health_delays
            .insert(target_group.to_string(), polls);
    }

    /// Fail the next `failures` resize calls against the group.
    pub fn fail_resizes(&self, group: &str, failures: u32) {
        self.state
            .lock()
            .resize_failures
            .insert(group.to_string(), failures);
    }

    /// Keep a deleted load balancer visible for `polls` describe calls.
    pub fn delay_lb_deletion(&self, name: &str, polls: u32) {
        self.state
            .lock()
            .lb_delete_delays
            .insert(name.to_string(), polls);
    }

    /// Force one instance to report unhealthy.
    pub fn mark_unhealthy(&self, instance: &InstanceId) {
        self.state
            .lock()
            .unhealthy
            .insert(instance.as_str().to_string());
    }

    // ------------------------------------------------------------------
    // Inspection for tests and rehearsal summaries.
    // ------------------------------------------------------------------

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().groups.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn group_capacity(&self, name: &str) -> Option<Capacity> {
        self.state.lock().groups.get(name).map(|g| g.capacity)
    }

    pub fn group_tags(&self, name: &str) -> Option<HashMap<String, String>> {
        self.state.lock().groups.get(name).map(|g| g.tags.clone())
    }

    pub fn group_target_groups(&self, name: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .groups
            .get(name)
            .map(|g| g.target_groups.clone())
    }

    pub fn group_template(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .groups
            .get(name)
            .map(|g| g.launch_template.clone())
    }

    pub fn group_policy_names(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .groups
            .get(name)
            .map(|g| g.policies.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn metrics_enabled(&self, name: &str) -> bool {
        self.state
            .lock()
            .groups
            .get(name)
            .map(|g| g.metrics_enabled)
            .unwrap_or(false)
    }

    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().templates.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn template_security_groups(&self, name: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .templates
            .get(name)
            .map(|t| t.security_groups.clone())
    }

    pub fn has_load_balancer(&self, name: &str) -> bool {
        self.state.lock().load_balancers.contains_key(name)
    }

    pub fn has_security_group(&self, name: &str) -> bool {
        self.state.lock().security_groups.contains_key(name)
    }

    pub fn has_target_group(&self, name: &str) -> bool {
        self.state.lock().target_groups.contains_key(name)
    }

    pub fn detachments(&self) -> Vec<(SecurityGroupId, Vec<String>)> {
        self.state.lock().detachments.clone()
    }
}

#[async_trait]
impl TemplateOps for MemoryCloud {
    async fn create_template(&self, spec: &TemplateSpec) -> Result<(), TemplateError> {
        let mut state = self.state.lock();
        if state.templates.contains_key(&spec.name) {
            return Err(TemplateError::AlreadyExists(spec.name.clone()));
        }
        state.templates.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> Result<(), TemplateError> {
        let mut state = self.state.lock();
        state
            .templates
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl GroupOps for MemoryCloud {
    async fn create_group(&self, spec: &GroupSpec) -> Result<(), GroupError> {
        spec.capacity
            .validate()
            .map_err(|e| GroupError::InvalidCapacity(e.to_string()))?;

        let mut state = self.state.lock();
        if state.groups.contains_key(&spec.name) {
            return Err(GroupError::AlreadyExists(spec.name.clone()));
        }

        let instances = (0..spec.capacity.desired)
            .map(|_| self.spawn_instance(&mut state))
            .collect();

        state.groups.insert(
            spec.name.clone(),
            GroupRecord {
                launch_template: spec.launch_template.clone(),
                capacity: spec.capacity,
                target_groups: spec.target_groups.clone(),
                tags: spec.tags.clone(),
                instances,
                policies: Vec::new(),
                alarms: Vec::new(),
                metrics_enabled: false,
            },
        );
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        if !record.instances.is_empty() {
            return Err(GroupError::Provider(format!(
                "group {name} still has {} instances",
                record.instances.len()
            )));
        }
        state.groups.remove(name);
        Ok(())
    }

    async fn resize_group(&self, name: &str, capacity: Capacity) -> Result<(), GroupError> {
        let mut state = self.state.lock();

        if let Some(remaining) = state.resize_failures.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GroupError::Throttled(format!(
                    "injected throttle for {name}"
                )));
            }
        }

        let current = state
            .groups
            .get(name)
            .map(|record| record.instances.len())
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;

        // Instances track desired capacity immediately; provider-side
        // scaling lag is modeled with the health-delay knob instead.
        let desired = capacity.desired as usize;
        let mut fresh = Vec::new();
        for _ in current..desired {
            fresh.push(self.spawn_instance(&mut state));
        }

        let record = state.groups.get_mut(name).expect("checked above");
        record.capacity = capacity;
        record.instances.truncate(desired);
        record.instances.extend(fresh);
        Ok(())
    }

    async fn list_groups_by_prefix(&self, prefix: &str) -> Result<Vec<GroupSummary>, GroupError> {
        let state = self.state.lock();
        let mut summaries: Vec<GroupSummary> = state
            .groups
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, record)| GroupSummary {
                name: name.clone(),
                capacity: record.capacity,
                launch_template: Some(record.launch_template.clone()),
                target_groups: record.target_groups.clone(),
                tags: record.tags.clone(),
                instance_ids: record.instances.iter().map(|i| i.id.clone()).collect(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn describe_instances(&self, name: &str) -> Result<Vec<InstanceSummary>, GroupError> {
        let state = self.state.lock();
        state
            .groups
            .get(name)
            .map(|record| record.instances.clone())
            .ok_or_else(|| GroupError::NotFound(name.to_string()))
    }

    async fn attach_target_group(
        &self,
        name: &str,
        target_group: &str,
    ) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        if !record.target_groups.iter().any(|tg| tg == target_group) {
            record.target_groups.push(target_group.to_string());
        }
        Ok(())
    }

    async fn detach_target_group(
        &self,
        name: &str,
        target_group: &str,
    ) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        record.target_groups.retain(|tg| tg != target_group);
        Ok(())
    }

    async fn set_launch_template(&self, name: &str, template: &str) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        record.launch_template = template.to_string();
        Ok(())
    }

    async fn untag_group(&self, name: &str, key: &str) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        record.tags.remove(key);
        Ok(())
    }

    async fn enable_metrics_collection(&self, name: &str) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        record.metrics_enabled = true;
        Ok(())
    }

    async fn put_scaling_policy(
        &self,
        name: &str,
        policy: &ScalingPolicySpec,
    ) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        record.policies.retain(|p| p.name != policy.name);
        record.policies.push(policy.clone());
        Ok(())
    }

    async fn put_alarm(&self, name: &str, alarm: &AlarmSpec) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let record = state
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        record.alarms.retain(|a| a.name != alarm.name);
        record.alarms.push(alarm.clone());
        Ok(())
    }
}

#[async_trait]
impl BalancingOps for MemoryCloud {
    async fn copy_target_group(
        &self,
        source: &str,
        target: &str,
    ) -> Result<TargetGroupSummary, BalancingError> {
        let mut state = self.state.lock();
        if state.target_groups.contains_key(target) {
            return Err(BalancingError::TargetGroupAlreadyExists(target.to_string()));
        }

        // An unknown source is treated as a pre-existing production target
        // group and registered on first reference.
        if !state.target_groups.contains_key(source) {
            let arn = self.target_group_arn(&mut state, source);
            state.target_groups.insert(
                source.to_string(),
                TargetGroupSummary {
                    name: source.to_string(),
                    arn,
                },
            );
        }

        let arn = self.target_group_arn(&mut state, target);
        let summary = TargetGroupSummary {
            name: target.to_string(),
            arn,
        };
        state
            .target_groups
            .insert(target.to_string(), summary.clone());
        Ok(summary)
    }

    async fn delete_target_group(&self, name: &str) -> Result<(), BalancingError> {
        let mut state = self.state.lock();
        state
            .target_groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BalancingError::TargetGroupNotFound(name.to_string()))
    }

    async fn list_target_groups(
        &self,
        prefix: &str,
    ) -> Result<Vec<TargetGroupSummary>, BalancingError> {
        let state = self.state.lock();
        let mut summaries: Vec<TargetGroupSummary> = state
            .target_groups
            .values()
            .filter(|tg| tg.name.starts_with(prefix))
            .cloned()
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn target_health(&self, target_group: &str) -> Result<Vec<TargetHealth>, BalancingError> {
        let mut state = self.state.lock();

        if let Some(remaining) = state.health_delays.get_mut(target_group) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(Vec::new());
            }
        }

        let mut health = Vec::new();
        for record in state.groups.values() {
            if !record.target_groups.iter().any(|tg| tg == target_group) {
                continue;
            }
            for instance in &record.instances {
                health.push(TargetHealth {
                    instance: instance.id.clone(),
                    healthy: !state.unhealthy.contains(instance.id.as_str()),
                });
            }
        }
        Ok(health)
    }

    async fn create_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
    ) -> Result<LoadBalancerSummary, BalancingError> {
        let mut state = self.state.lock();
        if state.load_balancers.contains_key(&spec.name) {
            return Err(BalancingError::LoadBalancerAlreadyExists(spec.name.clone()));
        }

        state.counter += 1;
        let summary = LoadBalancerSummary {
            name: spec.name.clone(),
            arn: LoadBalancerArn::new(format!(
                "arn:cloud:balancing:{}:loadbalancer/{}/{:016x}",
                self.region, spec.name, state.counter
            )),
            state: "active".to_string(),
        };
        state
            .load_balancers
            .insert(spec.name.clone(), summary.clone());
        Ok(summary)
    }

    async fn delete_load_balancer(&self, name: &str) -> Result<(), BalancingError> {
        let mut state = self.state.lock();
        if !state.load_balancers.contains_key(name) {
            return Err(BalancingError::LoadBalancerNotFound(name.to_string()));
        }

        // With a deletion delay configured the balancer stays visible to
        // describe calls for a while, like a real provider's async delete.
        if let Some(polls) = state.lb_delete_delays.remove(name) {
            state.pending_lb_deletes.insert(name.to_string(), polls);
        } else {
            state.load_balancers.remove(name);
        }
        Ok(())
    }

    async fn describe_load_balancer(
        &self,
        name: &str,
    ) -> Result<Option<LoadBalancerSummary>, BalancingError> {
        let mut state = self.state.lock();

        if let Some(remaining) = state.pending_lb_deletes.get_mut(name) {
            if *remaining == 0 {
                state.pending_lb_deletes.remove(name);
                state.load_balancers.remove(name);
                return Ok(None);
            }
            *remaining -= 1;
        }

        Ok(state.load_balancers.get(name).cloned())
    }
}

#[async_trait]
impl FirewallOps for MemoryCloud {
    async fn create_security_group(
        &self,
        spec: &SecurityGroupSpec,
    ) -> Result<SecurityGroupId, FirewallError> {
        let mut state = self.state.lock();
        if state.security_groups.contains_key(&spec.name) {
            return Err(FirewallError::AlreadyExists(spec.name.clone()));
        }

        state.counter += 1;
        let id = SecurityGroupId::new(format!("sg-{:012x}", state.counter));
        state.security_groups.insert(spec.name.clone(), id.clone());
        Ok(id)
    }

    async fn delete_security_group(&self, id: &SecurityGroupId) -> Result<(), FirewallError> {
        let mut state = self.state.lock();
        let name = state
            .security_groups
            .iter()
            .find(|(_, existing)| *existing == id)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| FirewallError::NotFound(id.to_string()))?;
        state.security_groups.remove(&name);
        Ok(())
    }

    async fn find_security_group(
        &self,
        name: &str,
    ) -> Result<Option<SecurityGroupId>, FirewallError> {
        Ok(self.state.lock().security_groups.get(name).cloned())
    }

    async fn detach_from_interfaces(
        &self,
        id: &SecurityGroupId,
        interfaces: &[String],
    ) -> Result<(), FirewallError> {
        self.state
            .lock()
            .detachments
            .push((id.clone(), interfaces.to_vec()));
        Ok(())
    }
}

/// Lazily created per-region `MemoryCloud` instances sharing nothing, the
/// way real per-region clients do.
pub struct MemoryFleet {
    regions: Mutex<HashMap<RegionId, Arc<MemoryCloud>>>,
}

impl MemoryFleet {
    pub fn new() -> Self {
        MemoryFleet {
            regions: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self, region: &RegionId) -> Arc<MemoryCloud> {
        self.regions
            .lock()
            .entry(region.clone())
            .or_insert_with(|| Arc::new(MemoryCloud::new(region.clone())))
            .clone()
    }
}

impl Default for MemoryFleet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionId {
        RegionId::new("us-east-1").unwrap()
    }

    fn group_spec(name: &str, desired: u32) -> GroupSpec {
        GroupSpec {
            name: name.to_string(),
            launch_template: format!("{name}-template"),
            capacity: Capacity {
                min: 0,
                desired,
                max: desired.max(1),
            },
            subnets: vec![],
            target_groups: vec!["app-tg".to_string()],
            tags: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn create_spawns_desired_instances() {
        let cloud = MemoryCloud::new(region());
        cloud.create_group(&group_spec("app-v000", 3)).await.unwrap();

        let instances = cloud.describe_instances("app-v000").await.unwrap();
        assert_eq!(instances.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_create_reports_already_exists() {
        let cloud = MemoryCloud::new(region());
        cloud.create_group(&group_spec("app-v000", 1)).await.unwrap();

        let err = cloud.create_group(&group_spec("app-v000", 1)).await;
        assert!(matches!(err, Err(GroupError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn resize_to_zero_drains_instances() {
        let cloud = MemoryCloud::new(region());
        cloud.create_group(&group_spec("app-v000", 2)).await.unwrap();

        cloud
            .resize_group("app-v000", Capacity::ZERO)
            .await
            .unwrap();
        assert!(cloud.describe_instances("app-v000").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_refuses_while_instances_remain() {
        let cloud = MemoryCloud::new(region());
        cloud.create_group(&group_spec("app-v000", 1)).await.unwrap();

        assert!(cloud.delete_group("app-v000").await.is_err());

        cloud
            .resize_group("app-v000", Capacity::ZERO)
            .await
            .unwrap();
        assert!(cloud.delete_group("app-v000").await.is_ok());
    }

    #[tokio::test]
    async fn target_health_follows_attached_groups() {
        let cloud = MemoryCloud::new(region());
        cloud.create_group(&group_spec("app-v000", 2)).await.unwrap();

        let health = cloud.target_health("app-tg").await.unwrap();
        assert_eq!(health.len(), 2);
        assert!(health.iter().all(|h| h.healthy));
    }

    #[tokio::test]
    async fn health_delay_reports_empty_then_recovers() {
        let cloud = MemoryCloud::new(region());
        cloud.create_group(&group_spec("app-v000", 1)).await.unwrap();
        cloud.hold_health("app-tg", 2);

        assert!(cloud.target_health("app-tg").await.unwrap().is_empty());
        assert!(cloud.target_health("app-tg").await.unwrap().is_empty());
        assert_eq!(cloud.target_health("app-tg").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delayed_lb_deletion_stays_visible() {
        let cloud = MemoryCloud::new(region());
        let spec = LoadBalancerSpec {
            name: "app-lb".to_string(),
            subnets: vec![],
            security_groups: vec![],
        };
        cloud.create_load_balancer(&spec).await.unwrap();
        cloud.delay_lb_deletion("app-lb", 1);
        cloud.delete_load_balancer("app-lb").await.unwrap();

        assert!(cloud.describe_load_balancer("app-lb").await.unwrap().is_some());
        assert!(cloud.describe_load_balancer("app-lb").await.unwrap().is_none());
    }
}
