//! Controller-specific error types.
//!
//! This module defines error types specific to the metrics controller
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use metrics_client::MetricsError;
use thiserror::Error;

/// Errors that can occur in the metrics controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Metrics service API error
    #[error("metrics service error: {0}")]
    Service(#[from] MetricsError),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("resource watch failed: {0}")]
    Watch(String),
}
