// ABOUTME: Pipeline driver: barrier fan-out/fan-in across stacks per phase.
// ABOUTME: Phase N+1 never starts until phase N finished for every stack.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::cloud::CloudOps;
use crate::config::{Manifest, RunContext, RunMode};
use crate::deploy::{DeployError, Step};
use crate::error::Result;
use crate::notify::send_best_effort;
use crate::strategy::{DeployManager, manager_for};
use crate::types::RegionId;

/// Step order of the deploy pipeline.
pub const DEPLOY_SEQUENCE: [Step; 9] = Step::ALL;

/// The delete pipeline bypasses the deploy-side steps entirely.
pub const DELETE_SEQUENCE: [Step; 5] = [
    Step::CheckPrevious,
    Step::LifecycleCallbacks,
    Step::CleanPrevious,
    Step::CleanChecking,
    Step::GatherMetrics,
];

/// One run of the deployment pipeline over a set of stacks.
pub struct Pipeline {
    managers: Vec<Box<dyn DeployManager>>,
}

impl Pipeline {
    /// Build one strategy machine per manifest stack, obtaining a provider
    /// client per region from `factory`.
    pub fn build<C, F>(manifest: &Manifest, factory: F) -> Result<Self>
    where
        C: CloudOps + 'static,
        F: Fn(&RegionId) -> Result<Arc<C>>,
    {
        let mut managers = Vec::new();

        for stack in manifest.stacks.iter() {
            let mut clients = HashMap::new();
            for region in stack.regions.iter() {
                clients.insert(region.region.clone(), factory(&region.region)?);
            }
            managers.push(manager_for(stack.clone(), manifest.env.clone(), clients));
        }

        Ok(Pipeline { managers })
    }

    /// Assemble a pipeline from pre-built strategy machines.
    pub fn from_managers(managers: Vec<Box<dyn DeployManager>>) -> Self {
        Pipeline { managers }
    }

    /// Run every step of the mode's sequence with a strict barrier between
    /// steps: a step runs concurrently for all stacks, and the next one
    /// starts only when the whole cohort succeeded.
    pub async fn run(mut self, ctx: &RunContext) -> std::result::Result<(), DeployError> {
        let sequence: &[Step] = match ctx.mode {
            RunMode::Deploy => &DEPLOY_SEQUENCE,
            RunMode::Delete => &DELETE_SEQUENCE,
        };

        if ctx.mode == RunMode::Delete {
            for manager in &mut self.managers {
                manager.skip_deploy_step();
            }
        }

        let mut managers = self.managers;
        for step in sequence {
            info!(step = step.title(), stacks = managers.len(), "starting pipeline step");
            managers = run_step(managers, *step, ctx).await?;
        }

        send_best_effort(
            ctx.notifier.as_ref(),
            &format!(
                "{} pipeline finished for {} stack(s)",
                ctx.mode.as_str(),
                managers.len()
            ),
        )
        .await;

        Ok(())
    }
}

/// Run one step on every stack concurrently, collect all errors, and fail
/// only after the whole cohort finished its attempt.
async fn run_step(
    managers: Vec<Box<dyn DeployManager>>,
    step: Step,
    ctx: &RunContext,
) -> std::result::Result<Vec<Box<dyn DeployManager>>, DeployError> {
    let count = managers.len();
    let mut tasks = JoinSet::new();

    for (index, mut manager) in managers.into_iter().enumerate() {
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let result = dispatch(manager.as_mut(), step, &ctx).await;
            (index, manager, result)
        });
    }

    let mut slots: Vec<Option<Box<dyn DeployManager>>> = (0..count).map(|_| None).collect();
    let mut errors: Vec<(String, DeployError)> = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, manager, result)) => {
                if let Err(e) = result {
                    errors.push((manager.stack_name().to_string(), e));
                }
                slots[index] = Some(manager);
            }
            Err(join_error) => {
                if join_error.is_panic() {
                    // Surface the panic exactly once at the top-level
                    // boundary instead of swallowing it here.
                    std::panic::resume_unwind(join_error.into_panic());
                }
                return Err(DeployError::Worker(join_error.to_string()));
            }
        }
    }

    if !errors.is_empty() {
        for (stack, e) in &errors {
            error!(stack = stack.as_str(), step = step.title(), error = %e, "pipeline step failed");
        }
        let (_, first) = errors.into_iter().next().expect("errors is non-empty");
        return Err(first);
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("every worker returns its manager"))
        .collect())
}

async fn dispatch(
    manager: &mut dyn DeployManager,
    step: Step,
    ctx: &RunContext,
) -> std::result::Result<(), DeployError> {
    match step {
        Step::CheckPrevious => manager.check_previous_resources(ctx).await,
        Step::Deploy => manager.deploy(ctx).await,
        Step::HealthCheck => manager.health_checking(ctx).await,
        Step::AdditionalWork => manager.finish_additional_work(ctx).await,
        Step::LifecycleCallbacks => manager.trigger_lifecycle_callbacks(ctx).await,
        Step::CleanPrevious => manager.clean_previous_version(ctx).await,
        Step::CleanChecking => manager.clean_checking(ctx).await,
        Step::GatherMetrics => manager.gather_metrics(ctx).await,
        Step::ApiTest => manager.run_api_test(ctx).await,
    }
}
