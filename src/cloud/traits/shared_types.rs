// ABOUTME: Specification and summary types shared across the provider traits.
// ABOUTME: The engine builds specs; providers return summaries.

use crate::config::Capacity;
use crate::types::{InstanceId, LoadBalancerArn, SecurityGroupId, TargetGroupArn};
use std::collections::HashMap;
use std::time::Duration;

/// Launch template specification.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub name: String,
    /// Machine image the template boots from.
    pub image: String,
    pub instance_type: String,
    pub security_groups: Vec<String>,
    pub user_data: Option<String>,
}

/// Autoscaling group specification.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: String,
    pub launch_template: String,
    pub capacity: Capacity,
    pub subnets: Vec<String>,
    /// Target groups the group's instances register with.
    pub target_groups: Vec<String>,
    pub tags: HashMap<String, String>,
}

/// Summary information about an autoscaling group.
#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub name: String,
    pub capacity: Capacity,
    pub launch_template: Option<String>,
    pub target_groups: Vec<String>,
    pub tags: HashMap<String, String>,
    pub instance_ids: Vec<InstanceId>,
}

/// Summary information about a compute instance.
#[derive(Debug, Clone)]
pub struct InstanceSummary {
    pub id: InstanceId,
    /// Provider lifecycle state, e.g. "pending" or "running".
    pub state: String,
    /// Network interface identifiers attached to the instance.
    pub network_interfaces: Vec<String>,
}

/// Summary information about a target group.
#[derive(Debug, Clone)]
pub struct TargetGroupSummary {
    pub name: String,
    pub arn: TargetGroupArn,
}

/// Health of one registered target.
#[derive(Debug, Clone)]
pub struct TargetHealth {
    pub instance: InstanceId,
    pub healthy: bool,
}

/// Load balancer specification.
#[derive(Debug, Clone)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<SecurityGroupId>,
}

/// Summary information about a load balancer.
#[derive(Debug, Clone)]
pub struct LoadBalancerSummary {
    pub name: String,
    pub arn: LoadBalancerArn,
    /// Provider state, e.g. "provisioning" or "active".
    pub state: String,
}

/// Security group specification.
#[derive(Debug, Clone)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub description: String,
    pub ingress: Vec<IngressRule>,
}

/// One ingress rule of a security group.
#[derive(Debug, Clone)]
pub struct IngressRule {
    pub port: u16,
    pub cidr: String,
}

/// Scaling policy attached to a group after deployment.
#[derive(Debug, Clone)]
pub struct ScalingPolicySpec {
    pub name: String,
    pub adjustment: i32,
    pub cooldown: Duration,
}

/// Alarm attached to a group after deployment.
#[derive(Debug, Clone)]
pub struct AlarmSpec {
    pub name: String,
    pub metric: String,
    pub threshold: f64,
    pub evaluation_periods: u32,
}
