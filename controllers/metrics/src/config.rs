//! Controller configuration.
//!
//! All external dependencies (service endpoint, credentials, watch scope,
//! requeue tuning) are collected into one struct in `main` and passed down
//! explicitly. Nothing reads the environment after startup.

use crate::error::ControllerError;
use std::env;
use std::time::Duration;

/// Requeue and backoff tuning for the reconcilers.
///
/// The transient-state intervals control how often the controller polls a
/// resource that the remote service is still working on. Retryable call
/// failures use a bounded Fibonacci backoff between `error_backoff_min_secs`
/// and `error_backoff_max_secs` instead.
#[derive(Debug, Clone)]
pub struct RequeueConfig {
    /// Poll interval while a resource is CREATING
    pub while_creating: Duration,
    /// Poll interval while a resource is UPDATING
    pub while_updating: Duration,
    /// Poll interval while a resource is DELETING
    pub while_deleting: Duration,
    /// First backoff step after a retryable call failure, in seconds
    pub error_backoff_min_secs: u64,
    /// Backoff cap, in seconds
    pub error_backoff_max_secs: u64,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            while_creating: Duration::from_secs(15),
            while_updating: Duration::from_secs(10),
            while_deleting: Duration::from_secs(10),
            error_backoff_min_secs: 5,
            error_backoff_max_secs: 300,
        }
    }
}

/// Top-level controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Metrics service endpoint
    pub endpoint: String,
    /// API token for the metrics service
    pub token: String,
    /// Namespace to watch, or None for "default"
    pub namespace: Option<String>,
    /// Requeue and backoff tuning
    pub requeue: RequeueConfig,
}

impl ControllerConfig {
    /// Loads configuration from environment variables.
    ///
    /// `METRICS_ENDPOINT` and `METRICS_TOKEN` are required. `WATCH_NAMESPACE`
    /// and the requeue intervals (`REQUEUE_CREATING_SECONDS`,
    /// `REQUEUE_UPDATING_SECONDS`, `REQUEUE_DELETING_SECONDS`) are optional.
    pub fn from_env() -> Result<Self, ControllerError> {
        let endpoint = env::var("METRICS_ENDPOINT").map_err(|_| {
            ControllerError::InvalidConfig(
                "METRICS_ENDPOINT environment variable is required".to_string(),
            )
        })?;
        let token = env::var("METRICS_TOKEN").map_err(|_| {
            ControllerError::InvalidConfig(
                "METRICS_TOKEN environment variable is required".to_string(),
            )
        })?;
        let namespace = env::var("WATCH_NAMESPACE").ok();

        let mut requeue = RequeueConfig::default();
        if let Some(secs) = read_seconds("REQUEUE_CREATING_SECONDS")? {
            requeue.while_creating = secs;
        }
        if let Some(secs) = read_seconds("REQUEUE_UPDATING_SECONDS")? {
            requeue.while_updating = secs;
        }
        if let Some(secs) = read_seconds("REQUEUE_DELETING_SECONDS")? {
            requeue.while_deleting = secs;
        }

        Ok(Self {
            endpoint,
            token,
            namespace,
            requeue,
        })
    }
}

fn read_seconds(var: &str) -> Result<Option<Duration>, ControllerError> {
    match env::var(var) {
        Err(_) => Ok(None),
        Ok(raw) => {
            let secs: u64 = raw.parse().map_err(|_| {
                ControllerError::InvalidConfig(format!("{var} must be a number of seconds, got {raw:?}"))
            })?;
            Ok(Some(Duration::from_secs(secs)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requeue_intervals() {
        let requeue = RequeueConfig::default();
        assert_eq!(requeue.while_creating, Duration::from_secs(15));
        assert_eq!(requeue.while_updating, Duration::from_secs(10));
        assert_eq!(requeue.while_deleting, Duration::from_secs(10));
        assert!(requeue.error_backoff_min_secs < requeue.error_backoff_max_secs);
    }
}
