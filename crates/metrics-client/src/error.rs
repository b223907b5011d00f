//! Metrics service client errors
//!
//! Every variant carries a retry classification. The reconcilers never
//! inspect message strings; they branch on the variant and on
//! [`MetricsError::is_retryable`].

use thiserror::Error;

/// Errors that can occur when interacting with the metrics control-plane API
#[derive(Debug, Error)]
pub enum MetricsError {
    /// HTTP request/response error (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned an unexpected error (5xx or unrecognized body)
    #[error("metrics service error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with existing remote state, e.g. a rule groups
    /// namespace name already in use or a second singleton definition
    #[error("conflict: {0}")]
    Conflict(String),

    /// The service rejected the request as malformed or invalid
    #[error("validation failed: {0}")]
    Validation(String),

    /// The service is throttling this caller
    #[error("throttled: {0}")]
    Throttled(String),

    /// A service quota would be exceeded
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The caller is not permitted to perform the operation
    #[error("access denied: {0}")]
    AccessDenied(String),
}

impl MetricsError {
    /// Whether a caller should retry the failed call later.
    ///
    /// Transport failures are retryable but leave the remote effect unknown;
    /// callers must re-observe remote state before re-issuing a mutation.
    /// Conflict, validation, quota and permission failures are stable until
    /// the request itself changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api(_) | Self::Throttled(_)
        )
    }

    /// True for the not-found variant. Callers handle missing resources
    /// structurally rather than as a retry decision.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MetricsError::Throttled("slow down".into()).is_retryable());
        assert!(MetricsError::Api("internal error".into()).is_retryable());

        assert!(!MetricsError::Conflict("exists".into()).is_retryable());
        assert!(!MetricsError::Validation("bad field".into()).is_retryable());
        assert!(!MetricsError::LimitExceeded("quota".into()).is_retryable());
        assert!(!MetricsError::AccessDenied("no".into()).is_retryable());
        assert!(!MetricsError::NotFound("gone".into()).is_retryable());

        assert!(MetricsError::NotFound("gone".into()).is_not_found());
        assert!(!MetricsError::Conflict("exists".into()).is_not_found());
    }
}
