// ABOUTME: Composable capability traits for cloud providers.
// ABOUTME: Defines GroupOps, TemplateOps, BalancingOps, and FirewallOps.

mod balancing;
mod firewall;
mod groups;
mod shared_types;
mod templates;

pub use balancing::{BalancingError, BalancingOps};
pub use firewall::{FirewallError, FirewallOps};
pub use groups::{GroupError, GroupOps};
pub use shared_types::*;
pub use templates::{TemplateError, TemplateOps};
