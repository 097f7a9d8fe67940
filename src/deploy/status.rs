// ABOUTME: Pipeline step identifiers and the per-deployer step gate.
// ABOUTME: A step may only run once its immediate predecessor has completed.

use super::error::DeployError;

/// One stage of the deployment pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CheckPrevious,
    Deploy,
    HealthCheck,
    AdditionalWork,
    LifecycleCallbacks,
    CleanPrevious,
    CleanChecking,
    GatherMetrics,
    ApiTest,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::CheckPrevious,
        Step::Deploy,
        Step::HealthCheck,
        Step::AdditionalWork,
        Step::LifecycleCallbacks,
        Step::CleanPrevious,
        Step::CleanChecking,
        Step::GatherMetrics,
        Step::ApiTest,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Step::CheckPrevious => "check-previous",
            Step::Deploy => "deploy",
            Step::HealthCheck => "health-check",
            Step::AdditionalWork => "additional-work",
            Step::LifecycleCallbacks => "lifecycle-callbacks",
            Step::CleanPrevious => "clean-previous",
            Step::CleanChecking => "clean-checking",
            Step::GatherMetrics => "gather-metrics",
            Step::ApiTest => "api-test",
        }
    }

    fn index(&self) -> usize {
        Step::ALL.iter().position(|s| s == self).expect("step in ALL")
    }

    fn predecessor(&self) -> Option<Step> {
        let idx = self.index();
        if idx == 0 { None } else { Some(Step::ALL[idx - 1]) }
    }
}

/// Completion flags for every step, scoped to one deployer.
///
/// Created all-false at deployer construction and never reset; a handler
/// marks its own step complete only on success.
#[derive(Debug, Clone)]
pub struct StepStatus {
    completed: [bool; Step::ALL.len()],
}

impl StepStatus {
    pub fn new() -> Self {
        StepStatus {
            completed: [false; Step::ALL.len()],
        }
    }

    pub fn is_complete(&self, step: Step) -> bool {
        self.completed[step.index()]
    }

    /// Fail unless the step's immediate predecessor has completed.
    pub fn ensure_ready(&self, step: Step) -> Result<(), DeployError> {
        match step.predecessor() {
            Some(prev) if !self.is_complete(prev) => Err(DeployError::StepNotReady {
                step: step.title(),
                predecessor: prev.title(),
            }),
            _ => Ok(()),
        }
    }

    pub fn complete(&mut self, step: Step) {
        self.completed[step.index()] = true;
    }

    /// Mark the deploy-side steps complete without doing their work, so the
    /// delete pipeline can jump straight to the cleanup steps.
    pub fn skip_deploy_steps(&mut self) {
        self.complete(Step::Deploy);
        self.complete(Step::HealthCheck);
        self.complete(Step::AdditionalWork);
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_is_always_ready() {
        let status = StepStatus::new();
        assert!(status.ensure_ready(Step::CheckPrevious).is_ok());
    }

    #[test]
    fn step_blocked_until_predecessor_completes() {
        let mut status = StepStatus::new();
        assert!(matches!(
            status.ensure_ready(Step::Deploy),
            Err(DeployError::StepNotReady { .. })
        ));

        status.complete(Step::CheckPrevious);
        assert!(status.ensure_ready(Step::Deploy).is_ok());
    }

    #[test]
    fn skip_unlocks_lifecycle_callbacks() {
        let mut status = StepStatus::new();
        status.complete(Step::CheckPrevious);
        status.skip_deploy_steps();
        assert!(status.ensure_ready(Step::LifecycleCallbacks).is_ok());
        assert!(!status.is_complete(Step::LifecycleCallbacks));
    }
}
