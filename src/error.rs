// ABOUTME: Application-wide error types for armada.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::deploy::DeployError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("manifest file not found in {0}")]
    ManifestNotFound(PathBuf),

    #[error("unknown stack: {0}")]
    UnknownStack(String),

    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error(
        "no cloud provider bindings are linked into this build; \
         embed the library with your provider or pass --rehearse"
    )]
    ProviderUnavailable,

    #[error("lifecycle callback failed: {0}")]
    Callback(String),

    #[error("deployment failed: {0}")]
    Deploy(#[from] DeployError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
