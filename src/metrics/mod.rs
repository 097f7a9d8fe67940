// ABOUTME: Deployment-record persistence collaborator.
// ABOUTME: The gather-metrics step hands one record per stack to the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics storage failed: {0}")]
    Storage(String),
}

/// One deployment's outcome, serialized by stores that persist to
/// table storage or similar.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub stack: String,
    pub env: String,
    pub mode: String,
    pub strategy: String,
    pub started_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub regions: Vec<RegionRecord>,
}

/// Per-region slice of a deployment record.
#[derive(Debug, Clone, Serialize)]
pub struct RegionRecord {
    pub region: String,
    pub group: Option<String>,
    pub version: Option<u32>,
    pub previous_groups: Vec<String>,
}

/// Metrics persistence capability.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn record(&self, record: &DeploymentRecord) -> Result<(), MetricsError>;
}

/// Discards every record. Useful in tests and with `--disable-metrics`.
pub struct NoopMetrics;

#[async_trait]
impl MetricsStore for NoopMetrics {
    async fn record(&self, _record: &DeploymentRecord) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Logs every record as one JSON line. The default for rehearsal runs.
pub struct LogMetrics;

#[async_trait]
impl MetricsStore for LogMetrics {
    async fn record(&self, record: &DeploymentRecord) -> Result<(), MetricsError> {
        let json =
            serde_json::to_string(record).map_err(|e| MetricsError::Storage(e.to_string()))?;
        info!(target: "armada::metrics", "{json}");
        Ok(())
    }
}
