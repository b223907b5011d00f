//! AlertManagerDefinition reconciler
//!
//! The definition is a singleton per workspace: the remote service rejects a
//! second creation with a conflict, which surfaces as a terminal condition
//! on the offending CR while the first one stays synced. Configuration
//! handling mirrors the rule groups namespace: byte-exact diff against the
//! accepted `data`, asynchronous put, poll to completion.

use super::Reconciler;
use super::{
    Deletion, REASON_CREATING, REASON_CREATION_FAILED, REASON_DELETING, REASON_SPEC_CHANGED,
    REASON_SYNCED, REASON_UPDATE_FAILED, REASON_UPDATING, ReconcileAction, apply_status,
    ensure_finalizer, poll_interval, record_removed_out_of_band, record_retry, record_terminal,
    remove_finalizer, to_crd_status,
};
use crate::config::RequeueConfig;
use crate::diff::configuration_differs;
use crate::error::ControllerError;
use crate::observed::{ObjectKey, ObservedCache};
use crds::{
    AlertManagerDefinition, AlertManagerDefinitionSpec, AlertManagerDefinitionStatus, conditions,
};
use kube_runtime::controller::Action;
use metrics_client::{AlertManagerDefinitionDescription, MetricsClientTrait};
use tracing::{debug, info, warn};

fn converged(spec: &AlertManagerDefinitionSpec, observed: &AlertManagerDefinitionDescription) -> bool {
    observed.status.status_code == metrics_client::StatusCode::Active
        && !configuration_differs(&spec.configuration, observed.data.as_deref())
}

/// Computes the next status and scheduling decision for a live
/// AlertManagerDefinition CR.
pub(crate) async fn plan_alert_manager_definition(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<AlertManagerDefinitionDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &AlertManagerDefinitionSpec,
    current: Option<&AlertManagerDefinitionStatus>,
    generation: Option<i64>,
) -> Result<(AlertManagerDefinitionStatus, ReconcileAction), ControllerError> {
    let mut next = current.cloned().unwrap_or_default();
    let spec_changed = current.is_none_or(|s| s.observed_generation != generation);
    next.observed_generation = generation;

    if conditions::is_terminal(&next.conditions) {
        if !spec_changed {
            return Ok((next, ReconcileAction::AwaitChange));
        }
        conditions::set_terminal(
            &mut next.conditions,
            false,
            REASON_SPEC_CHANGED,
            "spec changed, retrying",
        );
    }

    if next.status_code.is_none() {
        return plan_creation(client, cache, requeue, key, spec, next).await;
    }

    if !spec_changed
        && next.status_code == Some(crds::StatusCode::Active)
        && conditions::is_synced(&next.conditions)
        && cache.get(key).is_some_and(|entry| converged(spec, &entry.snapshot))
    {
        debug!("AlertManagerDefinition {} already converged, skipping remote read", key);
        return Ok((next, ReconcileAction::AwaitChange));
    }

    let description = match client.describe_alert_manager_definition(&spec.workspace_id).await {
        Ok(description) => description,
        Err(err) if err.is_not_found() => {
            warn!(
                "AlertManagerDefinition {} (workspace {}) no longer exists remotely",
                key, spec.workspace_id
            );
            cache.invalidate(key);
            let action = record_removed_out_of_band(
                &mut next,
                format!(
                    "alert manager definition of workspace {} was removed outside the controller",
                    spec.workspace_id
                ),
            );
            return Ok((next, action));
        }
        Err(err) if err.is_retryable() => {
            let delay = record_retry(cache, key, requeue, &mut next, &err);
            return Ok((next, ReconcileAction::RequeueAfter(delay)));
        }
        Err(err) => {
            let action = record_terminal(&mut next, &err);
            return Ok((next, action));
        }
    };
    cache.clear_errors(key);

    let code = to_crd_status(description.status.status_code);
    next.status_code = Some(code);
    next.status_reason = description.status.status_reason.clone();
    next.data = description.data.clone();

    match code {
        crds::StatusCode::Creating | crds::StatusCode::Updating | crds::StatusCode::Deleting => {
            cache.record_observation(key, description);
            let reason = match code {
                crds::StatusCode::Updating => REASON_UPDATING,
                crds::StatusCode::Deleting => REASON_DELETING,
                _ => REASON_CREATING,
            };
            conditions::set_synced(
                &mut next.conditions,
                false,
                reason,
                format!("alert manager definition is {}", code.as_str()),
            );
            Ok((next, ReconcileAction::RequeueAfter(poll_interval(requeue, code))))
        }
        crds::StatusCode::CreationFailed | crds::StatusCode::UpdateFailed => {
            if spec_changed && configuration_differs(&spec.configuration, description.data.as_deref())
            {
                return submit_configuration(client, cache, requeue, key, spec, next).await;
            }
            cache.record_observation(key, description);
            let reason = if code == crds::StatusCode::CreationFailed {
                REASON_CREATION_FAILED
            } else {
                REASON_UPDATE_FAILED
            };
            conditions::set_synced(
                &mut next.conditions,
                true,
                reason,
                next.status_reason.clone().unwrap_or_else(|| code.as_str().to_string()),
            );
            Ok((next, ReconcileAction::AwaitChange))
        }
        crds::StatusCode::Active => {
            if configuration_differs(&spec.configuration, description.data.as_deref()) {
                return submit_configuration(client, cache, requeue, key, spec, next).await;
            }
            cache.record_observation(key, description);
            conditions::set_synced(
                &mut next.conditions,
                true,
                REASON_SYNCED,
                "alert manager definition is active and matches the desired state",
            );
            Ok((next, ReconcileAction::AwaitChange))
        }
    }
}

/// Creation path. The definition is keyed by its workspace, so after an
/// ambiguous earlier attempt the controller describes first and adopts what
/// it finds. A conflict on a clean first create means another definition
/// already owns the workspace slot, which is terminal.
async fn plan_creation(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<AlertManagerDefinitionDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &AlertManagerDefinitionSpec,
    mut next: AlertManagerDefinitionStatus,
) -> Result<(AlertManagerDefinitionStatus, ReconcileAction), ControllerError> {
    if cache.error_count(key) > 0 {
        match client.describe_alert_manager_definition(&spec.workspace_id).await {
            Ok(description) => {
                info!(
                    "AlertManagerDefinition {} adopting remote definition of workspace {} after ambiguous create",
                    key, spec.workspace_id
                );
                cache.clear_errors(key);
                next.status_code = Some(to_crd_status(description.status.status_code));
                next.status_reason = description.status.status_reason.clone();
                next.data = description.data.clone();
                cache.record_observation(key, description);
                conditions::set_synced(
                    &mut next.conditions,
                    false,
                    REASON_CREATING,
                    "adopted existing alert manager definition, waiting for it to settle",
                );
                return Ok((next, ReconcileAction::RequeueAfter(requeue.while_creating)));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) if err.is_retryable() => {
                let delay = record_retry(cache, key, requeue, &mut next, &err);
                return Ok((next, ReconcileAction::RequeueAfter(delay)));
            }
            Err(err) => {
                let action = record_terminal(&mut next, &err);
                return Ok((next, action));
            }
        }
    }

    match client
        .create_alert_manager_definition(&spec.workspace_id, &spec.configuration)
        .await
    {
        Ok(created) => {
            info!(
                "Created alert manager definition for workspace {}",
                spec.workspace_id
            );
            cache.clear_errors(key);
            next.status_code = Some(to_crd_status(created.status.status_code));
            next.status_reason = created.status.status_reason;
            conditions::set_synced(
                &mut next.conditions,
                false,
                REASON_CREATING,
                "alert manager definition creation accepted",
            );
            Ok((next, ReconcileAction::RequeueAfter(requeue.while_creating)))
        }
        Err(err) if err.is_retryable() => {
            let delay = record_retry(cache, key, requeue, &mut next, &err);
            Ok((next, ReconcileAction::RequeueAfter(delay)))
        }
        Err(err) => {
            warn!("AlertManagerDefinition {} creation rejected: {}", key, err);
            let action = record_terminal(&mut next, &err);
            Ok((next, action))
        }
    }
}

async fn submit_configuration(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<AlertManagerDefinitionDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &AlertManagerDefinitionSpec,
    mut next: AlertManagerDefinitionStatus,
) -> Result<(AlertManagerDefinitionStatus, ReconcileAction), ControllerError> {
    match client
        .put_alert_manager_definition(&spec.workspace_id, &spec.configuration)
        .await
    {
        Ok(response) => {
            info!("Submitted alert manager configuration for {}", key);
            cache.clear_errors(key);
            cache.invalidate(key);
            next.status_code = Some(to_crd_status(response.status.status_code));
            next.status_reason = response.status.status_reason;
            conditions::set_synced(
                &mut next.conditions,
                false,
                REASON_UPDATING,
                "new configuration submitted, waiting for the service to accept it",
            );
            Ok((next, ReconcileAction::RequeueAfter(requeue.while_updating)))
        }
        Err(err) if err.is_retryable() => {
            let delay = record_retry(cache, key, requeue, &mut next, &err);
            Ok((next, ReconcileAction::RequeueAfter(delay)))
        }
        Err(err) => {
            let action = record_terminal(&mut next, &err);
            Ok((next, action))
        }
    }
}

/// Deletion path: issue the remote delete once, then poll until not found.
pub(crate) async fn plan_alert_manager_definition_deletion(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<AlertManagerDefinitionDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &AlertManagerDefinitionSpec,
    current: Option<&AlertManagerDefinitionStatus>,
) -> Result<(Option<AlertManagerDefinitionStatus>, Deletion), ControllerError> {
    let Some(mut next) = current.cloned() else {
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    };
    if next.status_code.is_none() {
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    }

    if next.status_code == Some(crds::StatusCode::Deleting) {
        return match client.describe_alert_manager_definition(&spec.workspace_id).await {
            Err(err) if err.is_not_found() => {
                info!("AlertManagerDefinition {} confirmed deleted", key);
                cache.remove(key);
                Ok((None, Deletion::Complete))
            }
            Ok(description) => {
                next.status_code = Some(to_crd_status(description.status.status_code));
                next.status_reason = description.status.status_reason;
                conditions::set_synced(
                    &mut next.conditions,
                    false,
                    REASON_DELETING,
                    "waiting for remote deletion to finish",
                );
                Ok((Some(next), Deletion::InProgress(requeue.while_deleting)))
            }
            Err(err) if err.is_retryable() => {
                let delay = record_retry(cache, key, requeue, &mut next, &err);
                Ok((Some(next), Deletion::InProgress(delay)))
            }
            Err(err) => Err(err.into()),
        };
    }

    match client.delete_alert_manager_definition(&spec.workspace_id).await {
        Ok(()) => {
            info!("Deletion of alert manager definition {} accepted", key);
            next.status_code = Some(crds::StatusCode::Deleting);
            conditions::set_synced(
                &mut next.conditions,
                false,
                REASON_DELETING,
                "remote deletion requested",
            );
            Ok((Some(next), Deletion::InProgress(requeue.while_deleting)))
        }
        Err(err) if err.is_not_found() => {
            cache.remove(key);
            Ok((None, Deletion::Complete))
        }
        Err(metrics_client::MetricsError::Conflict(_)) => {
            conditions::set_synced(
                &mut next.conditions,
                false,
                REASON_DELETING,
                "remote object is transitioning, retrying deletion",
            );
            Ok((Some(next), Deletion::InProgress(requeue.while_deleting)))
        }
        Err(err) if err.is_retryable() => {
            let delay = record_retry(cache, key, requeue, &mut next, &err);
            Ok((Some(next), Deletion::InProgress(delay)))
        }
        Err(err) => Err(err.into()),
    }
}

impl Reconciler {
    /// Reconciles an AlertManagerDefinition resource.
    pub async fn reconcile_alert_manager_definition(
        &self,
        definition: &AlertManagerDefinition,
    ) -> Result<Action, ControllerError> {
        let name = definition.metadata.name.clone().ok_or_else(|| {
            ControllerError::InvalidConfig("AlertManagerDefinition missing name".to_string())
        })?;
        let namespace = definition.metadata.namespace.as_deref().unwrap_or("default");
        let key = ObjectKey::new(namespace, name.clone());

        info!("Reconciling AlertManagerDefinition {}", key);

        if definition.metadata.deletion_timestamp.is_some() {
            let (status, deletion) = plan_alert_manager_definition_deletion(
                self.client.as_ref(),
                &self.alert_manager_definition_cache,
                &self.requeue,
                &key,
                &definition.spec,
                definition.status.as_ref(),
            )
            .await?;
            if let Some(next) = status {
                apply_status(
                    &self.alert_manager_definition_api,
                    "AlertManagerDefinition",
                    &name,
                    definition.status.as_ref(),
                    next,
                )
                .await?;
            }
            return match deletion {
                Deletion::Complete => {
                    remove_finalizer(
                        &self.alert_manager_definition_api,
                        definition,
                        "AlertManagerDefinition",
                    )
                    .await?;
                    Ok(Action::await_change())
                }
                Deletion::InProgress(delay) => Ok(Action::requeue(delay)),
            };
        }

        ensure_finalizer(
            &self.alert_manager_definition_api,
            definition,
            "AlertManagerDefinition",
        )
        .await?;

        let (next, action) = plan_alert_manager_definition(
            self.client.as_ref(),
            &self.alert_manager_definition_cache,
            &self.requeue,
            &key,
            &definition.spec,
            definition.status.as_ref(),
            definition.metadata.generation,
        )
        .await?;
        apply_status(
            &self.alert_manager_definition_api,
            "AlertManagerDefinition",
            &name,
            definition.status.as_ref(),
            next,
        )
        .await?;
        Ok(action.into_action())
    }
}
