// ABOUTME: Lifecycle callback system for deployment events.
// ABOUTME: Discovers and executes shell scripts at pre-deploy, before-clean, post-deploy, and on-error points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::types::StackName;

/// Callback execution points in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPoint {
    /// Before the pipeline starts. Failure aborts the run.
    PreDeploy,
    /// Before previous versions are cleaned. Failure logs warning.
    BeforeClean,
    /// After a successful run. Failure logs warning.
    PostDeploy,
    /// On run failure. Failure logs warning.
    OnError,
}

impl CallbackPoint {
    /// Get the callback filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            CallbackPoint::PreDeploy => "pre-deploy",
            CallbackPoint::BeforeClean => "before-clean",
            CallbackPoint::PostDeploy => "post-deploy",
            CallbackPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this callback point should abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CallbackPoint::PreDeploy)
    }
}

/// Context passed to callbacks via environment variables.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    pub stack: StackName,
    pub env: String,
    pub mode: String,
    pub regions: Vec<String>,
    pub new_version: Option<String>,
}

impl CallbackContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("ARMADA_STACK".to_string(), self.stack.to_string());
        env.insert("ARMADA_ENV".to_string(), self.env.clone());
        env.insert("ARMADA_MODE".to_string(), self.mode.clone());
        env.insert("ARMADA_REGIONS".to_string(), self.regions.join(","));
        if let Some(ref version) = self.new_version {
            env.insert("ARMADA_NEW_VERSION".to_string(), version.clone());
        }
        env
    }
}

/// Result of running a callback.
#[derive(Debug)]
pub struct CallbackResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs callbacks from a project directory.
pub struct CallbackRunner {
    callbacks_dir: PathBuf,
}

impl CallbackRunner {
    /// Create a runner looking for callbacks in the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            callbacks_dir: project_dir.join(".armada").join("callbacks"),
        }
    }

    /// Check if a callback exists for the given point.
    pub fn callback_exists(&self, point: CallbackPoint) -> bool {
        self.callback_path(point).is_file()
    }

    /// Get the path to a callback script.
    fn callback_path(&self, point: CallbackPoint) -> PathBuf {
        self.callbacks_dir.join(point.filename())
    }

    /// Run a callback if it exists.
    ///
    /// Returns None if the callback doesn't exist, or Some(CallbackResult)
    /// if it was run.
    pub async fn run(
        &self,
        point: CallbackPoint,
        context: &CallbackContext,
    ) -> Option<CallbackResult> {
        let callback_path = self.callback_path(point);

        if !callback_path.is_file() {
            return None;
        }

        tracing::info!(
            "Running {} callback: {}",
            point.filename(),
            callback_path.display()
        );

        let env_vars = context.to_env();

        let output = Command::new(&callback_path)
            .envs(&env_vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = CallbackResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} callback completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} callback failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} callback: {}", point.filename(), e);
                Some(CallbackResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_point_filenames() {
        assert_eq!(CallbackPoint::PreDeploy.filename(), "pre-deploy");
        assert_eq!(CallbackPoint::BeforeClean.filename(), "before-clean");
        assert_eq!(CallbackPoint::PostDeploy.filename(), "post-deploy");
        assert_eq!(CallbackPoint::OnError.filename(), "on-error");
    }

    #[test]
    fn pre_deploy_is_fatal() {
        assert!(CallbackPoint::PreDeploy.is_fatal());
        assert!(!CallbackPoint::BeforeClean.is_fatal());
        assert!(!CallbackPoint::PostDeploy.is_fatal());
        assert!(!CallbackPoint::OnError.is_fatal());
    }

    #[test]
    fn callback_context_to_env() {
        let context = CallbackContext {
            stack: StackName::new("myapp").unwrap(),
            env: "dev".to_string(),
            mode: "deploy".to_string(),
            regions: vec!["us-east-1".to_string(), "eu-west-1".to_string()],
            new_version: Some("v003".to_string()),
        };

        let env = context.to_env();
        assert_eq!(env.get("ARMADA_STACK"), Some(&"myapp".to_string()));
        assert_eq!(env.get("ARMADA_ENV"), Some(&"dev".to_string()));
        assert_eq!(env.get("ARMADA_MODE"), Some(&"deploy".to_string()));
        assert_eq!(
            env.get("ARMADA_REGIONS"),
            Some(&"us-east-1,eu-west-1".to_string())
        );
        assert_eq!(env.get("ARMADA_NEW_VERSION"), Some(&"v003".to_string()));
    }

    #[test]
    fn callback_context_without_new_version() {
        let context = CallbackContext {
            stack: StackName::new("myapp").unwrap(),
            env: "dev".to_string(),
            mode: "delete".to_string(),
            regions: vec![],
            new_version: None,
        };

        let env = context.to_env();
        assert!(!env.contains_key("ARMADA_NEW_VERSION"));
    }

    #[test]
    fn callback_runner_checks_callbacks_dir() {
        let runner = CallbackRunner::new(Path::new("/nonexistent"));
        assert!(!runner.callback_exists(CallbackPoint::PreDeploy));
    }
}
