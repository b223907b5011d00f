//! Kubernetes resource watchers.
//!
//! This module handles watching the managed metrics CRDs for changes and
//! triggering reconciliation using kube_runtime::Controller.
//!
//! All watchers use a generic `watch_resource()` helper that properly handles
//! the reconcile loop with automatic reconnection and retry logic. The
//! Controller machinery also guarantees at most one in-flight reconciliation
//! per object: a new event for an object queues behind the running pass
//! instead of racing it.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::{AlertManagerDefinition, LoggingConfiguration, RuleGroupsNamespace, Workspace};
use futures::StreamExt;
use kube::Api;
use kube_runtime::{
    Controller,
    controller::{Action, Config as ControllerConfig},
    watcher,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Generic watcher helper built on kube_runtime::Controller.
///
/// - Automatic reconnection and watch retries
/// - Per-object serialized reconciliation
/// - Requeue scheduling driven by the Action each reconcile pass returns
///
/// The reconcile_fn wraps a reconciler method with the signature
/// `async fn reconcile(&self, resource: &K) -> Result<Action, ControllerError>`.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Action, ControllerError>> + Send>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    info!("Starting {} watcher", resource_name);

    // Error policy for failures that escape the reconcilers (Kubernetes API
    // errors, deletion calls that could not be classified): requeue after a
    // fixed interval. Service-level retries use the per-object backoff
    // inside the reconcilers instead.
    let error_policy = |obj: Arc<K>, error: &ControllerError, _ctx: Arc<Reconciler>| {
        error!("Reconciliation error for {} {:?}: {}", resource_name, obj.meta().name, error);
        Action::requeue(Duration::from_secs(60))
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        let resource_name = resource_name.to_string();
        async move {
            debug!("Reconciling {} {:?}", resource_name, obj.meta().name);
            match reconcile_fn(ctx, obj).await {
                Ok(action) => Ok(action),
                Err(e) => {
                    error!("Reconciliation failed for {}: {}", resource_name, e);
                    Err(e)
                }
            }
        }
    };

    // Debounce batches bursts of status updates; concurrency bounds how many
    // distinct objects reconcile at once per watcher.
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(4);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

/// Watches the managed metrics CRDs for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    workspace_api: Api<Workspace>,
    rule_groups_namespace_api: Api<RuleGroupsNamespace>,
    alert_manager_definition_api: Api<AlertManagerDefinition>,
    logging_configuration_api: Api<LoggingConfiguration>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        workspace_api: Api<Workspace>,
        rule_groups_namespace_api: Api<RuleGroupsNamespace>,
        alert_manager_definition_api: Api<AlertManagerDefinition>,
        logging_configuration_api: Api<LoggingConfiguration>,
    ) -> Self {
        Self {
            reconciler,
            workspace_api,
            rule_groups_namespace_api,
            alert_manager_definition_api,
            logging_configuration_api,
        }
    }

    /// Watches Workspace resources.
    pub async fn watch_workspaces(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.workspace_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, workspace: Arc<Workspace>| {
                Box::pin(async move { reconciler.reconcile_workspace(&workspace).await })
            },
            "Workspace",
        )
        .await
    }

    /// Watches RuleGroupsNamespace resources.
    pub async fn watch_rule_groups_namespaces(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.rule_groups_namespace_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, rule_groups_namespace: Arc<RuleGroupsNamespace>| {
                Box::pin(async move {
                    reconciler
                        .reconcile_rule_groups_namespace(&rule_groups_namespace)
                        .await
                })
            },
            "RuleGroupsNamespace",
        )
        .await
    }

    /// Watches AlertManagerDefinition resources.
    pub async fn watch_alert_manager_definitions(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.alert_manager_definition_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, definition: Arc<AlertManagerDefinition>| {
                Box::pin(async move { reconciler.reconcile_alert_manager_definition(&definition).await })
            },
            "AlertManagerDefinition",
        )
        .await
    }

    /// Watches LoggingConfiguration resources.
    pub async fn watch_logging_configurations(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.logging_configuration_api.clone(),
            Arc::clone(&self.reconciler),
            |reconciler, logging_configuration: Arc<LoggingConfiguration>| {
                Box::pin(async move {
                    reconciler
                        .reconcile_logging_configuration(&logging_configuration)
                        .await
                })
            },
            "LoggingConfiguration",
        )
        .await
    }
}
