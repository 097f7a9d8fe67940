// ABOUTME: Cloud provider contract consumed by the deployment engine.
// ABOUTME: Trait set, shared types, unified error, and the in-memory provider.

mod error;
pub mod memory;
mod traits;

pub use error::{CloudError, CloudErrorKind};
pub use traits::{
    AlarmSpec, BalancingError, BalancingOps, FirewallError, FirewallOps, GroupError, GroupOps,
    GroupSpec, GroupSummary, IngressRule, InstanceSummary, LoadBalancerSpec, LoadBalancerSummary,
    ScalingPolicySpec, SecurityGroupSpec, TargetGroupSummary, TargetHealth, TemplateError,
    TemplateOps, TemplateSpec,
};

/// The full provider capability set the engine depends on.
///
/// Real bindings live outside this crate; `cloud::memory` implements the
/// contract in-memory for rehearsal runs and tests.
pub trait CloudOps: GroupOps + TemplateOps + BalancingOps + FirewallOps {}

impl<T: GroupOps + TemplateOps + BalancingOps + FirewallOps> CloudOps for T {}
