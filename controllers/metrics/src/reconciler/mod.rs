//! Reconciliation logic for the managed metrics CRDs.
//!
//! One module per resource kind:
//! - `workspace`: Workspace
//! - `rule_groups_namespace`: RuleGroupsNamespace
//! - `alert_manager_definition`: AlertManagerDefinition (singleton per workspace)
//! - `logging_configuration`: LoggingConfiguration (singleton per workspace)
//!
//! Each kind is split into a planning layer and a thin Kubernetes wrapper.
//! The planning functions (`plan_*`, `plan_*_deletion`) talk only to the
//! metrics client and the observed-state cache and return the next status
//! plus a scheduling decision, so they can be unit tested against the mock
//! client. The `reconcile_*` methods handle finalizers and patch the status
//! subresource when it changed.

pub mod alert_manager_definition;
pub mod logging_configuration;
pub mod rule_groups_namespace;
pub mod workspace;

#[cfg(test)]
mod alert_manager_definition_test;
#[cfg(test)]
mod logging_configuration_test;
#[cfg(test)]
mod rule_groups_namespace_test;
#[cfg(test)]
mod workspace_test;

use crate::backoff::FibonacciBackoff;
use crate::config::RequeueConfig;
use crate::error::ControllerError;
use crate::observed::{ObjectKey, ObservedCache};
use chrono::{DateTime, Utc};
use crds::{
    AlertManagerDefinition, AlertManagerDefinitionStatus, LoggingConfiguration,
    LoggingConfigurationStatus, ResourceCondition, RuleGroupsNamespace, RuleGroupsNamespaceStatus,
    Workspace, WorkspaceStatus, conditions,
};
use kube::Api;
use kube::api::{Patch, PatchParams};
use kube_runtime::controller::Action;
use metrics_client::{
    AlertManagerDefinitionDescription, LoggingConfigurationMetadata, MetricsClientTrait,
    MetricsError, RuleGroupsNamespaceDescription, WorkspaceDescription,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Finalizer added to every managed CR so the remote object is deleted and
/// confirmed gone before the local object disappears.
pub(crate) const FINALIZER: &str = "metrics.microscaler.io/finalizer";

// Condition reasons surfaced in status
pub(crate) const REASON_CREATING: &str = "Creating";
pub(crate) const REASON_UPDATING: &str = "Updating";
pub(crate) const REASON_DELETING: &str = "Deleting";
pub(crate) const REASON_SYNCED: &str = "Synced";
pub(crate) const REASON_CREATION_FAILED: &str = "CreationFailed";
pub(crate) const REASON_UPDATE_FAILED: &str = "UpdateFailed";
pub(crate) const REASON_RETRYING: &str = "RetryableError";
pub(crate) const REASON_REMOVED_OUT_OF_BAND: &str = "RemovedOutOfBand";
pub(crate) const REASON_SPEC_CHANGED: &str = "SpecChanged";

/// Scheduling decision produced by a planning function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconcileAction {
    /// Run again after the given delay (polling a transient status, or
    /// backing off after a retryable failure)
    RequeueAfter(Duration),
    /// Stable state: reconcile again only on an external trigger
    AwaitChange,
}

impl ReconcileAction {
    pub(crate) fn into_action(self) -> Action {
        match self {
            Self::RequeueAfter(delay) => Action::requeue(delay),
            Self::AwaitChange => Action::await_change(),
        }
    }
}

/// Outcome of a deletion planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deletion {
    /// Remote deletion not yet confirmed; poll again after the delay
    InProgress(Duration),
    /// Remote object confirmed gone; the finalizer can be removed
    Complete,
}

/// Maps the client's status code onto the CRD status code.
pub(crate) fn to_crd_status(code: metrics_client::StatusCode) -> crds::StatusCode {
    match code {
        metrics_client::StatusCode::Creating => crds::StatusCode::Creating,
        metrics_client::StatusCode::Active => crds::StatusCode::Active,
        metrics_client::StatusCode::Updating => crds::StatusCode::Updating,
        metrics_client::StatusCode::Deleting => crds::StatusCode::Deleting,
        metrics_client::StatusCode::CreationFailed => crds::StatusCode::CreationFailed,
        metrics_client::StatusCode::UpdateFailed => crds::StatusCode::UpdateFailed,
    }
}

/// Condition reason for a non-retryable client error.
pub(crate) fn terminal_reason(err: &MetricsError) -> &'static str {
    match err {
        MetricsError::Conflict(_) => "Conflict",
        MetricsError::Validation(_) => "ValidationError",
        MetricsError::LimitExceeded(_) => "LimitExceeded",
        MetricsError::AccessDenied(_) => "AccessDenied",
        MetricsError::NotFound(_) => "NotFound",
        _ => "ServiceError",
    }
}

/// Poll interval for a transient remote status.
pub(crate) fn poll_interval(requeue: &RequeueConfig, code: crds::StatusCode) -> Duration {
    match code {
        crds::StatusCode::Creating => requeue.while_creating,
        crds::StatusCode::Deleting => requeue.while_deleting,
        _ => requeue.while_updating,
    }
}

/// Access to the fields every managed status type shares.
///
/// Lets the generic status helpers (retry bookkeeping, terminal marking,
/// changed-status detection) work across all four kinds.
pub(crate) trait ManagedStatus {
    fn conditions_mut(&mut self) -> &mut Vec<ResourceCondition>;
    fn last_reconciled(&self) -> Option<DateTime<Utc>>;
    fn set_last_reconciled(&mut self, at: Option<DateTime<Utc>>);
}

macro_rules! impl_managed_status {
    ($($status:ty),+ $(,)?) => {
        $(
            impl ManagedStatus for $status {
                fn conditions_mut(&mut self) -> &mut Vec<ResourceCondition> {
                    &mut self.conditions
                }
                fn last_reconciled(&self) -> Option<DateTime<Utc>> {
                    self.last_reconciled
                }
                fn set_last_reconciled(&mut self, at: Option<DateTime<Utc>>) {
                    self.last_reconciled = at;
                }
            }
        )+
    };
}

impl_managed_status!(
    WorkspaceStatus,
    RuleGroupsNamespaceStatus,
    AlertManagerDefinitionStatus,
    LoggingConfigurationStatus,
);

/// Records a retryable call failure and returns the backoff delay.
///
/// The snapshot is dropped because the call's remote effect is unknown; the
/// next pass re-observes before mutating again.
pub(crate) fn record_retry<S: ManagedStatus, T: Clone>(
    cache: &ObservedCache<T>,
    key: &ObjectKey,
    requeue: &RequeueConfig,
    next: &mut S,
    err: &MetricsError,
) -> Duration {
    let count = cache.record_error(key);
    cache.invalidate(key);
    conditions::set_synced(
        next.conditions_mut(),
        false,
        REASON_RETRYING,
        format!("{err} (attempt {count})"),
    );
    FibonacciBackoff::for_error_count(
        count,
        requeue.error_backoff_min_secs,
        requeue.error_backoff_max_secs,
    )
}

/// Marks a non-retryable failure. The resource stays put until the user
/// changes the spec or deletes it.
pub(crate) fn record_terminal<S: ManagedStatus>(next: &mut S, err: &MetricsError) -> ReconcileAction {
    let reason = terminal_reason(err);
    conditions::set_terminal(next.conditions_mut(), true, reason, err.to_string());
    conditions::set_synced(next.conditions_mut(), false, reason, err.to_string());
    ReconcileAction::AwaitChange
}

/// Marks an object whose remote counterpart vanished outside the controller.
/// Surfaced as a terminal error; the object is never recreated automatically.
pub(crate) fn record_removed_out_of_band<S: ManagedStatus>(next: &mut S, detail: String) -> ReconcileAction {
    conditions::set_synced(
        next.conditions_mut(),
        false,
        REASON_REMOVED_OUT_OF_BAND,
        detail.clone(),
    );
    conditions::set_terminal(next.conditions_mut(), true, REASON_REMOVED_OUT_OF_BAND, detail);
    ReconcileAction::AwaitChange
}

/// Whether a status patch is needed, ignoring the `lastReconciled` stamp so
/// an otherwise-identical pass does not trigger a write (and with it another
/// reconciliation).
pub(crate) fn status_needs_update<S>(current: Option<&S>, next: &S) -> bool
where
    S: ManagedStatus + Clone + PartialEq,
{
    match current {
        None => true,
        Some(current) => {
            let mut normalized = next.clone();
            normalized.set_last_reconciled(current.last_reconciled());
            current != &normalized
        }
    }
}

/// Patches the status subresource when it actually changed.
pub(crate) async fn apply_status<K, S>(
    api: &Api<K>,
    kind: &str,
    name: &str,
    current: Option<&S>,
    mut next: S,
) -> Result<(), ControllerError>
where
    K: kube::Resource<DynamicType = ()> + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
    S: ManagedStatus + Clone + PartialEq + serde::Serialize,
{
    if status_needs_update(current, &next) {
        next.set_last_reconciled(Some(Utc::now()));
        let patch = serde_json::json!({ "status": next });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Updated {} {} status", kind, name);
    } else {
        debug!("{} {} status unchanged, skipping update", kind, name);
    }
    Ok(())
}

fn object_name<K: kube::Resource>(obj: &K, kind: &str) -> Result<String, ControllerError> {
    obj.meta()
        .name
        .clone()
        .ok_or_else(|| ControllerError::InvalidConfig(format!("{kind} resource has no name")))
}

/// True when the object carries the controller finalizer.
pub(crate) fn has_finalizer<K: kube::Resource>(obj: &K) -> bool {
    obj.meta()
        .finalizers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|f| f == FINALIZER)
}

/// Adds the controller finalizer if it is missing.
pub(crate) async fn ensure_finalizer<K>(api: &Api<K>, obj: &K, kind: &str) -> Result<(), ControllerError>
where
    K: kube::Resource<DynamicType = ()> + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
{
    if has_finalizer(obj) {
        return Ok(());
    }
    let name = object_name(obj, kind)?;
    let mut finalizers = obj.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(FINALIZER.to_string());
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!("Added finalizer to {} {}", kind, name);
    Ok(())
}

/// Removes the controller finalizer, letting the apiserver delete the object.
pub(crate) async fn remove_finalizer<K>(api: &Api<K>, obj: &K, kind: &str) -> Result<(), ControllerError>
where
    K: kube::Resource<DynamicType = ()> + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
{
    if !has_finalizer(obj) {
        return Ok(());
    }
    let name = object_name(obj, kind)?;
    let finalizers: Vec<String> = obj
        .meta()
        .finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != FINALIZER)
        .collect();
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!("Removed finalizer from {} {}", kind, name);
    Ok(())
}

/// Reconciles the managed metrics resources.
pub struct Reconciler {
    pub(crate) client: Arc<dyn MetricsClientTrait>,
    pub(crate) workspace_api: Api<Workspace>,
    pub(crate) rule_groups_namespace_api: Api<RuleGroupsNamespace>,
    pub(crate) alert_manager_definition_api: Api<AlertManagerDefinition>,
    pub(crate) logging_configuration_api: Api<LoggingConfiguration>,
    pub(crate) workspace_cache: ObservedCache<WorkspaceDescription>,
    pub(crate) rule_groups_namespace_cache: ObservedCache<RuleGroupsNamespaceDescription>,
    pub(crate) alert_manager_definition_cache: ObservedCache<AlertManagerDefinitionDescription>,
    pub(crate) logging_configuration_cache: ObservedCache<LoggingConfigurationMetadata>,
    pub(crate) requeue: RequeueConfig,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: Arc<dyn MetricsClientTrait>,
        workspace_api: Api<Workspace>,
        rule_groups_namespace_api: Api<RuleGroupsNamespace>,
        alert_manager_definition_api: Api<AlertManagerDefinition>,
        logging_configuration_api: Api<LoggingConfiguration>,
        requeue: RequeueConfig,
    ) -> Self {
        Self {
            client,
            workspace_api,
            rule_groups_namespace_api,
            alert_manager_definition_api,
            logging_configuration_api,
            workspace_cache: ObservedCache::new(),
            rule_groups_namespace_cache: ObservedCache::new(),
            alert_manager_definition_cache: ObservedCache::new(),
            logging_configuration_cache: ObservedCache::new(),
            requeue,
        }
    }
}
