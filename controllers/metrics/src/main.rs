//! Metrics Controller
//!
//! Keeps the managed metrics CRDs in sync with the remote metrics service:
//! - Workspace: the top-level container, created asynchronously by the service
//! - RuleGroupsNamespace: named rule groups configurations inside a workspace
//! - AlertManagerDefinition: the workspace's alert manager configuration
//! - LoggingConfiguration: the workspace's log delivery configuration
//!
//! The remote control plane is eventually consistent: mutating calls return
//! immediately and objects settle into their final status later. The
//! controller polls transient objects on a fixed interval and goes quiet once
//! they are stable, reporting progress through status conditions.

mod backoff;
mod config;
mod controller;
mod diff;
mod error;
mod observed;
mod reconciler;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting metrics controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Metrics endpoint: {}", config.endpoint);
    info!(
        "  Namespace: {}",
        config.namespace.as_deref().unwrap_or("default")
    );

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
