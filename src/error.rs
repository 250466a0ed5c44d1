use thiserror::Error;

use crate::provider::GatewayError;

/// Top-level error type for the control plane.
///
/// Variants follow the taxonomy the Provisioner and Reconciler distinguish
/// on: config errors never reach the cloud, cloud/remote errors carry enough
/// context to decide whether the caller should swallow or propagate them.
#[derive(Error, Debug)]
pub enum GscpError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cloud resource not found: {0}")]
    CloudNotFound(String),

    #[error("cloud resource conflict: {0}")]
    CloudConflict(String),

    #[error("cloud provider error: {0}")]
    CloudTransient(#[from] GatewayError),

    #[error("remote host error: {0}")]
    Remote(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SSH protocol error: {0}")]
    SshProtocol(#[from] russh::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GscpError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// True for the class of errors a reconcile/refresh pass should treat as
    /// "the cloud resource is already gone" rather than a hard failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::CloudNotFound(_) => true,
            Self::CloudTransient(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GscpError>;
