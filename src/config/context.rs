// ABOUTME: Run-wide configuration handed to every phase handler.
// ABOUTME: Carries flags, deadlines, and the external collaborators.

use crate::apitest::ApiTest;
use crate::callbacks::CallbackRunner;
use crate::error::{Error, Result};
use crate::metrics::MetricsStore;
use crate::notify::Notify;
use crate::types::RegionId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::Manifest;

/// Which pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Deploy,
    Delete,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Deploy => "deploy",
            RunMode::Delete => "delete",
        }
    }
}

/// Flag surface shared by the deploy and delete commands.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Restrict execution to one region.
    pub region: Option<RegionId>,
    /// Restrict execution to one stack.
    pub stack: Option<String>,
    /// Deadline for every polling loop of the run.
    pub timeout: Duration,
    /// Sleep between polling queries.
    pub poll_interval: Duration,
    /// Always apply the manifest-declared capacity, regardless of strategy.
    pub force_manifest_capacity: bool,
    /// Complete a previously started canary instead of starting one.
    pub complete_canary: bool,
    /// Skip metrics collection and persistence.
    pub disable_metrics: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            region: None,
            stack: None,
            timeout: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(30),
            force_manifest_capacity: false,
            complete_canary: false,
            disable_metrics: false,
        }
    }
}

/// The run configuration passed to every strategy phase handler.
///
/// Cheap to clone: collaborators sit behind `Arc`, so each pipeline worker
/// gets its own handle without sharing mutable state.
#[derive(Clone)]
pub struct RunContext {
    pub mode: RunMode,
    pub region: Option<RegionId>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub force_manifest_capacity: bool,
    pub complete_canary: bool,
    pub disable_metrics: bool,
    pub started_at: DateTime<Utc>,
    pub notifier: Arc<dyn Notify>,
    pub metrics: Arc<dyn MetricsStore>,
    pub api_test: Option<Arc<dyn ApiTest>>,
    pub callbacks: Option<Arc<CallbackRunner>>,
}

impl RunContext {
    pub fn new(
        mode: RunMode,
        options: &RunOptions,
        notifier: Arc<dyn Notify>,
        metrics: Arc<dyn MetricsStore>,
        api_test: Option<Arc<dyn ApiTest>>,
    ) -> Result<Self> {
        if options.timeout.is_zero() {
            return Err(Error::InvalidOptions("timeout must be non-zero".to_string()));
        }
        if options.poll_interval.is_zero() {
            return Err(Error::InvalidOptions(
                "polling interval must be non-zero".to_string(),
            ));
        }

        Ok(RunContext {
            mode,
            region: options.region.clone(),
            timeout: options.timeout,
            poll_interval: options.poll_interval,
            force_manifest_capacity: options.force_manifest_capacity,
            complete_canary: options.complete_canary,
            disable_metrics: options.disable_metrics,
            started_at: Utc::now(),
            notifier,
            metrics,
            api_test,
            callbacks: None,
        })
    }

    /// Attach a lifecycle callback runner.
    pub fn with_callbacks(mut self, callbacks: Arc<CallbackRunner>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// Reject flag/manifest combinations before any provider call.
    pub fn validate_against(&self, manifest: &Manifest) -> Result<()> {
        if let Some(region) = &self.region {
            if !manifest.regions().contains(region) {
                return Err(Error::UnknownRegion(region.to_string()));
            }
        }
        Ok(())
    }

    /// Whether a region participates in this run, given the region filter.
    pub fn region_in_scope(&self, region: &RegionId) -> bool {
        match &self.region {
            Some(filter) => filter == region,
            None => true,
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("mode", &self.mode)
            .field("region", &self.region)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("force_manifest_capacity", &self.force_manifest_capacity)
            .field("complete_canary", &self.complete_canary)
            .field("disable_metrics", &self.disable_metrics)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
