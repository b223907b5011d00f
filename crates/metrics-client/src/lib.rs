//! Managed Metrics Service API Client
//!
//! A Rust client library for the managed metrics control-plane API. Provides
//! type-safe models and methods for workspaces, rule groups namespaces, alert
//! manager definitions and logging configurations.
//!
//! The control plane is asynchronous and eventually consistent: a create or
//! update call returns immediately with a transient status (CREATING,
//! UPDATING) and the resource settles into ACTIVE or a failed status on the
//! service's own schedule. Callers poll `describe_*` to observe settling.
//!
//! # Example
//!
//! ```no_run
//! use metrics_client::{MetricsClient, MetricsClientTrait};
//! use std::collections::BTreeMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MetricsClient::new(
//!     "https://metrics.example.com".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! // Create a workspace and poll until it leaves CREATING
//! let created = client.create_workspace(Some("team-a"), &BTreeMap::new()).await?;
//! let ws = client.describe_workspace(&created.workspace_id).await?;
//! println!("workspace {} is {:?}", ws.workspace_id, ws.status.status_code);
//! # Ok(())
//! # }
//! ```
//!
//! # Error classification
//!
//! Every error carries its retry classification: throttling and transport
//! failures are retryable, conflicts and validation rejections are not. See
//! [`MetricsError::is_retryable`].

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod metrics_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::MetricsClient;
pub use error::MetricsError;
pub use metrics_trait::MetricsClientTrait;
pub use models::*;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockMetricsClient;
