//! Cloud gateway error types.
//!
//! This module provides structured error types for cloud gateway operations,
//! collapsed onto the taxonomy the Provisioner and Reconciler distinguish
//! on: not-found, conflict, and everything else transient.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Authentication failed (invalid/expired credentials).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Rate limit exceeded - includes optional retry-after duration.
    #[error("rate limit exceeded{}", .retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimit { retry_after: Option<Duration> },

    /// Resource not found (instance, snapshot, image, EIP, ...).
    #[error("{resource_type} not found: {id}")]
    NotFound { resource_type: String, id: String },

    /// The cloud resource is in a state that conflicts with the requested
    /// transition (`IncorrectInstanceState`, `ParameterAlreadyExists`, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid configuration or request parameters.
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    /// Operation timed out.
    #[error("operation timed out after {elapsed:?}: {operation}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    /// Network or transport error.
    #[error("network error: {0}")]
    Network(String),

    /// The cloud API returned an error response.
    #[error("cloud API error: {0}")]
    Api(String),

    /// Generic gateway error for edge cases.
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether a caller should back off and retry rather than propagate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            Self::Timeout { .. } => Some(Duration::from_secs(5)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = GatewayError::not_found("instance", "i-0123");
        assert_eq!(err.to_string(), "instance not found: i-0123");
        assert!(err.is_not_found());
    }

    #[test]
    fn rate_limit_with_retry() {
        let err = GatewayError::RateLimit {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert!(err.to_string().contains("retry after"));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn conflict_is_not_retryable() {
        let err = GatewayError::conflict("IncorrectInstanceState");
        assert!(err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        let err = GatewayError::timeout("wait_running", Duration::from_secs(300));
        assert!(err.to_string().contains("timed out"));
        assert!(err.is_retryable());
    }
}
