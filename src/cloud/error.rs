// ABOUTME: Unified cloud error with SNAFU pattern.
// ABOUTME: Wraps per-concern trait errors for programmatic handling.

use snafu::Snafu;

use super::traits::{BalancingError, FirewallError, GroupError, TemplateError};

/// Unified provider error across the four capability traits.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CloudError {
    #[snafu(display("autoscaling group operation failed: {source}"))]
    Group { source: GroupError },

    #[snafu(display("launch template operation failed: {source}"))]
    Template { source: TemplateError },

    #[snafu(display("load balancing operation failed: {source}"))]
    Balancing { source: BalancingError },

    #[snafu(display("security group operation failed: {source}"))]
    Firewall { source: FirewallError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudErrorKind {
    /// The named resource does not exist.
    NotFound,
    /// A creation call collided with an existing resource.
    AlreadyExists,
    /// The provider rejected the request rate.
    Throttled,
    /// The request itself was malformed.
    InvalidRequest,
    /// The resource is still referenced by another resource.
    InUse,
    /// Any other provider failure.
    Other,
}

impl CloudError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> CloudErrorKind {
        match self {
            CloudError::Group { source } => match source {
                GroupError::NotFound(_) => CloudErrorKind::NotFound,
                GroupError::AlreadyExists(_) => CloudErrorKind::AlreadyExists,
                GroupError::InvalidCapacity(_) => CloudErrorKind::InvalidRequest,
                GroupError::Throttled(_) => CloudErrorKind::Throttled,
                GroupError::Provider(_) => CloudErrorKind::Other,
            },
            CloudError::Template { source } => match source {
                TemplateError::NotFound(_) => CloudErrorKind::NotFound,
                TemplateError::AlreadyExists(_) => CloudErrorKind::AlreadyExists,
                TemplateError::InvalidSpec(_) => CloudErrorKind::InvalidRequest,
                TemplateError::Provider(_) => CloudErrorKind::Other,
            },
            CloudError::Balancing { source } => match source {
                BalancingError::TargetGroupNotFound(_)
                | BalancingError::LoadBalancerNotFound(_) => CloudErrorKind::NotFound,
                BalancingError::TargetGroupAlreadyExists(_)
                | BalancingError::LoadBalancerAlreadyExists(_) => CloudErrorKind::AlreadyExists,
                BalancingError::InUse(_) => CloudErrorKind::InUse,
                BalancingError::Provider(_) => CloudErrorKind::Other,
            },
            CloudError::Firewall { source } => match source {
                FirewallError::NotFound(_) => CloudErrorKind::NotFound,
                FirewallError::AlreadyExists(_) => CloudErrorKind::AlreadyExists,
                FirewallError::InUse(_) => CloudErrorKind::InUse,
                FirewallError::Provider(_) => CloudErrorKind::Other,
            },
        }
    }

    /// Whether a creation call collided with an existing resource, which
    /// callers resolve with a compensating lookup.
    pub fn is_already_exists(&self) -> bool {
        self.kind() == CloudErrorKind::AlreadyExists
    }

    /// Whether the named resource is gone.
    pub fn is_not_found(&self) -> bool {
        self.kind() == CloudErrorKind::NotFound
    }
}

impl From<GroupError> for CloudError {
    fn from(source: GroupError) -> Self {
        CloudError::Group { source }
    }
}

impl From<TemplateError> for CloudError {
    fn from(source: TemplateError) -> Self {
        CloudError::Template { source }
    }
}

impl From<BalancingError> for CloudError {
    fn from(source: BalancingError) -> Self {
        CloudError::Balancing { source }
    }
}

impl From<FirewallError> for CloudError {
    fn from(source: FirewallError) -> Self {
        CloudError::Firewall { source }
    }
}
