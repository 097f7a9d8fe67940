// ABOUTME: The DeployManager phase contract and the four strategy machines.
// ABOUTME: Each strategy wraps one deployer core by exclusive ownership.

mod blue_green;
mod canary;
mod deploy_only;
mod rolling;

pub use blue_green::BlueGreen;
pub use canary::Canary;
pub use deploy_only::DeployOnly;
pub use rolling::RollingUpdate;

use crate::cloud::CloudOps;
use crate::config::{RunContext, Stack, StrategyKind};
use crate::deploy::{DeployError, Deployer};
use crate::types::RegionId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// The capability set every strategy exposes to the pipeline driver.
///
/// Each method is one pipeline phase; the driver invokes the same phase on
/// every stack concurrently and barriers before the next one.
#[async_trait]
pub trait DeployManager: Send {
    fn stack_name(&self) -> &str;

    async fn check_previous_resources(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn deploy(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn health_checking(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn finish_additional_work(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn trigger_lifecycle_callbacks(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn clean_previous_version(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn clean_checking(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn gather_metrics(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    async fn run_api_test(&mut self, ctx: &RunContext) -> Result<(), DeployError>;

    /// Mark the deploy-side steps complete without doing their work, so
    /// the delete pipeline can jump straight to cleanup.
    fn skip_deploy_step(&mut self);
}

/// Build the strategy machine a stack's manifest asks for.
pub fn manager_for<C: CloudOps + 'static>(
    stack: Stack,
    env: String,
    clients: HashMap<RegionId, Arc<C>>,
) -> Box<dyn DeployManager> {
    let kind = stack.strategy;
    let core = Deployer::new(stack, env, clients);

    match kind {
        StrategyKind::BlueGreen => Box::new(BlueGreen::new(core)),
        StrategyKind::Canary => Box::new(Canary::new(core)),
        StrategyKind::RollingUpdate => Box::new(RollingUpdate::new(core)),
        StrategyKind::DeployOnly => Box::new(DeployOnly::new(core)),
    }
}
