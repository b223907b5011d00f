//! Main controller implementation.
//!
//! This module contains the `Controller` struct that orchestrates
//! reconciliation and resource watching for the metrics controller.
//!
//! The controller manages four CRD types:
//! - Workspace: a remote metrics workspace
//! - RuleGroupsNamespace: rule groups configuration inside a workspace
//! - AlertManagerDefinition: alert routing for a workspace (singleton)
//! - LoggingConfiguration: log delivery for a workspace (singleton)

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::{AlertManagerDefinition, LoggingConfiguration, RuleGroupsNamespace, Workspace};
use kube::{Api, Client};
use metrics_client::{MetricsClient, MetricsClientTrait};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for managed metrics resources.
pub struct Controller {
    workspace_watcher: JoinHandle<Result<(), ControllerError>>,
    rule_groups_namespace_watcher: JoinHandle<Result<(), ControllerError>>,
    alert_manager_definition_watcher: JoinHandle<Result<(), ControllerError>>,
    logging_configuration_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing metrics controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await.map_err(ControllerError::Kube)?;

        // Create metrics service client
        let metrics_client =
            MetricsClient::new(config.endpoint.clone(), config.token.clone()).map_err(ControllerError::Service)?;

        // Validate connectivity and credentials before proceeding
        info!("Validating metrics service connectivity...");
        metrics_client.validate_connectivity().await.map_err(|e| {
            error!("Failed to reach the metrics service: {}", e);
            error!("Please ensure:");
            error!("  1. METRICS_TOKEN is set correctly");
            error!("  2. The metrics service is reachable at {}", config.endpoint);
            ControllerError::Service(e)
        })?;
        info!("Metrics service connectivity established");

        // Create API clients for all CRD types
        let ns = config.namespace.as_deref().unwrap_or("default");
        let workspace_api: Api<Workspace> = Api::namespaced(kube_client.clone(), ns);
        let rule_groups_namespace_api: Api<RuleGroupsNamespace> =
            Api::namespaced(kube_client.clone(), ns);
        let alert_manager_definition_api: Api<AlertManagerDefinition> =
            Api::namespaced(kube_client.clone(), ns);
        let logging_configuration_api: Api<LoggingConfiguration> =
            Api::namespaced(kube_client.clone(), ns);

        // Create reconciler
        let reconciler = Reconciler::new(
            Arc::new(metrics_client),
            workspace_api.clone(),
            rule_groups_namespace_api.clone(),
            alert_manager_definition_api.clone(),
            logging_configuration_api.clone(),
            config.requeue.clone(),
        );
        let reconciler = Arc::new(reconciler);

        // Create a single watcher instance that handles all CRD types
        let watcher = Arc::new(Watcher::new(
            reconciler,
            workspace_api,
            rule_groups_namespace_api,
            alert_manager_definition_api,
            logging_configuration_api,
        ));

        // Start all watchers in background tasks
        let workspace_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_workspaces().await })
        };

        let rule_groups_namespace_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_rule_groups_namespaces().await })
        };

        let alert_manager_definition_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_alert_manager_definitions().await })
        };

        let logging_configuration_watcher = {
            let watcher = watcher;
            tokio::spawn(async move { watcher.watch_logging_configurations().await })
        };

        Ok(Self {
            workspace_watcher,
            rule_groups_namespace_watcher,
            alert_manager_definition_watcher,
            logging_configuration_watcher,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Metrics controller running");

        // Wait for any watcher to exit (they should run forever)
        tokio::select! {
            result = &mut self.workspace_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Workspace watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Workspace watcher error: {}", e)))?;
            }
            result = &mut self.rule_groups_namespace_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("RuleGroupsNamespace watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("RuleGroupsNamespace watcher error: {}", e)))?;
            }
            result = &mut self.alert_manager_definition_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("AlertManagerDefinition watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("AlertManagerDefinition watcher error: {}", e)))?;
            }
            result = &mut self.logging_configuration_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("LoggingConfiguration watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("LoggingConfiguration watcher error: {}", e)))?;
            }
        }

        Ok(())
    }
}
