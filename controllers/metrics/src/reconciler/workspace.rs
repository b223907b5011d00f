//! Workspace reconciler
//!
//! Drives a Workspace CR through creation, polling, in-place alias/tag
//! updates and deletion. Workspace creation is asynchronous (the remote
//! service settles it to ACTIVE on its own schedule); alias and tag changes
//! apply synchronously and never leave the ACTIVE status.

use super::Reconciler;
use super::{
    Deletion, REASON_CREATING, REASON_CREATION_FAILED, REASON_DELETING, REASON_SPEC_CHANGED,
    REASON_SYNCED, REASON_UPDATE_FAILED, REASON_UPDATING, ReconcileAction, apply_status,
    ensure_finalizer, poll_interval, record_removed_out_of_band, record_retry, record_terminal,
    remove_finalizer, to_crd_status,
};
use crate::config::RequeueConfig;
use crate::diff::diff_tags;
use crate::error::ControllerError;
use crate::observed::{ObjectKey, ObservedCache};
use crds::{Workspace, WorkspaceSpec, WorkspaceStatus, conditions};
use kube_runtime::controller::Action;
use metrics_client::{MetricsClientTrait, WorkspaceDescription};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Whether the cached observation already matches the desired spec.
fn converged(spec: &WorkspaceSpec, observed: &WorkspaceDescription) -> bool {
    observed.status.status_code == metrics_client::StatusCode::Active
        && spec.alias == observed.alias
        && diff_tags(
            &observed.tags,
            &spec.tags.clone().unwrap_or_default(),
        )
        .is_empty()
}

/// Computes the next status and scheduling decision for a live Workspace CR.
pub(crate) async fn plan_workspace(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<WorkspaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &WorkspaceSpec,
    current: Option<&WorkspaceStatus>,
    generation: Option<i64>,
) -> Result<(WorkspaceStatus, ReconcileAction), ControllerError> {
    let mut next = current.cloned().unwrap_or_default();
    let spec_changed = current.is_none_or(|s| s.observed_generation != generation);
    next.observed_generation = generation;

    // Terminal resources are only revisited after a spec change.
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

    let desired_tags = spec.tags.clone().unwrap_or_default();

    let Some(workspace_id) = next.workspace_id.clone() else {
        return plan_workspace_creation(client, cache, requeue, key, spec, next, &desired_tags).await;
    };

    // Converged and unchanged: nothing to read, nothing to do.
    if !spec_changed
        && next.status_code == Some(crds::StatusCode::Active)
        && conditions::is_synced(&next.conditions)
    {
        if let Some(entry) = cache.get(key) {
            if converged(spec, &entry.snapshot) {
                debug!(
                    "Workspace {} already converged (observed at {}), skipping remote read",
                    key, entry.observed_at
                );
                return Ok((next, ReconcileAction::AwaitChange));
            }
        }
    }

    let description = match client.describe_workspace(&workspace_id).await {
        Ok(description) => description,
        Err(err) if err.is_not_found() => {
            warn!("Workspace {} (ID: {}) no longer exists remotely", key, workspace_id);
            cache.invalidate(key);
            let action = record_removed_out_of_band(
                &mut next,
                format!("workspace {workspace_id} was removed outside the controller"),
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
    next.arn = Some(description.arn.clone());

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
                format!("workspace is {}", code.as_str()),
            );
            Ok((next, ReconcileAction::RequeueAfter(poll_interval(requeue, code))))
        }
        crds::StatusCode::CreationFailed | crds::StatusCode::UpdateFailed => {
            // A stable, accurately reported state. Only a spec change moves it.
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
            plan_active_workspace(client, cache, requeue, key, spec, next, description, &desired_tags)
                .await
        }
    }
}

/// Creation path: no remote identity recorded yet.
async fn plan_workspace_creation(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<WorkspaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &WorkspaceSpec,
    mut next: WorkspaceStatus,
    desired_tags: &BTreeMap<String, String>,
) -> Result<(WorkspaceStatus, ReconcileAction), ControllerError> {
    // A previous create attempt may have failed with unknown remote effect.
    // Re-observe by alias and adopt a live workspace rather than duplicating.
    if cache.error_count(key) > 0 {
        if let Some(alias) = spec.alias.as_deref() {
            match client.list_workspaces(Some(alias)).await {
                Ok(existing) => {
                    if let Some(ws) = existing
                        .into_iter()
                        .find(|w| w.status.status_code != metrics_client::StatusCode::Deleting)
                    {
                        info!(
                            "Workspace {} adopting existing remote workspace {} after ambiguous create",
                            key, ws.workspace_id
                        );
                        cache.clear_errors(key);
                        next.workspace_id = Some(ws.workspace_id);
                        next.arn = Some(ws.arn);
                        next.status_code = Some(to_crd_status(ws.status.status_code));
                        next.status_reason = ws.status.status_reason;
                        conditions::set_synced(
                            &mut next.conditions,
                            false,
                            REASON_CREATING,
                            "adopted existing workspace, waiting for it to settle",
                        );
                        return Ok((
                            next,
                            ReconcileAction::RequeueAfter(requeue.while_creating),
                        ));
                    }
                }
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
    }

    match client.create_workspace(spec.alias.as_deref(), desired_tags).await {
        Ok(created) => {
            info!("Created workspace {} (ID: {})", key, created.workspace_id);
            cache.clear_errors(key);
            next.workspace_id = Some(created.workspace_id);
            next.arn = Some(created.arn);
            next.status_code = Some(to_crd_status(created.status.status_code));
            next.status_reason = created.status.status_reason;
            conditions::set_synced(
                &mut next.conditions,
                false,
                REASON_CREATING,
                "workspace creation accepted, waiting for it to become active",
            );
            Ok((next, ReconcileAction::RequeueAfter(requeue.while_creating)))
        }
        Err(err) if err.is_retryable() => {
            let delay = record_retry(cache, key, requeue, &mut next, &err);
            Ok((next, ReconcileAction::RequeueAfter(delay)))
        }
        Err(err) => {
            warn!("Workspace {} creation rejected: {}", key, err);
            let action = record_terminal(&mut next, &err);
            Ok((next, action))
        }
    }
}

/// ACTIVE path: apply alias and tag deltas in place. Both are synchronous
/// remote operations, so the workspace stays ACTIVE and Synced throughout.
#[allow(clippy::too_many_arguments, reason = "internal planning helper")]
async fn plan_active_workspace(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<WorkspaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &WorkspaceSpec,
    mut next: WorkspaceStatus,
    mut observed: WorkspaceDescription,
    desired_tags: &BTreeMap<String, String>,
) -> Result<(WorkspaceStatus, ReconcileAction), ControllerError> {
    let workspace_id = observed.workspace_id.clone();

    if spec.alias != observed.alias {
        match client
            .update_workspace_alias(&workspace_id, spec.alias.as_deref())
            .await
        {
            Ok(()) => {
                info!("Updated alias of workspace {} (ID: {})", key, workspace_id);
                observed.alias = spec.alias.clone();
            }
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

    let tag_diff = diff_tags(&observed.tags, desired_tags);
    if !tag_diff.is_empty() {
        if !tag_diff.removals.is_empty() {
            match client.untag_resource(&observed.arn, &tag_diff.removals).await {
                Ok(()) => {
                    for removed in &tag_diff.removals {
                        observed.tags.remove(removed);
                    }
                }
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
        if !tag_diff.upserts.is_empty() {
            match client.tag_resource(&observed.arn, &tag_diff.upserts).await {
                Ok(()) => observed.tags.extend(tag_diff.upserts.clone()),
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
        info!("Reconciled tags of workspace {} (ID: {})", key, workspace_id);
    }

    cache.record_observation(key, observed);
    conditions::set_synced(
        &mut next.conditions,
        true,
        REASON_SYNCED,
        "workspace is active and matches the desired state",
    );
    Ok((next, ReconcileAction::AwaitChange))
}

/// Deletion path: issue the remote delete once, then poll until the service
/// reports the workspace gone. Safe to run from any prior state.
pub(crate) async fn plan_workspace_deletion(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<WorkspaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    current: Option<&WorkspaceStatus>,
) -> Result<(Option<WorkspaceStatus>, Deletion), ControllerError> {
    let Some(mut next) = current.cloned() else {
        // Never reached the remote service; nothing to clean up.
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    };
    let Some(workspace_id) = next.workspace_id.clone() else {
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    };

    if next.status_code == Some(crds::StatusCode::Deleting) {
        // Delete already accepted; poll until the read reports not found.
        return match client.describe_workspace(&workspace_id).await {
            Err(err) if err.is_not_found() => {
                info!("Workspace {} (ID: {}) confirmed deleted", key, workspace_id);
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

    match client.delete_workspace(&workspace_id).await {
        Ok(()) => {
            info!("Deletion of workspace {} (ID: {}) accepted", key, workspace_id);
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
            // The service refuses deletes mid-transition; poll and retry.
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
    /// Reconciles a Workspace resource.
    pub async fn reconcile_workspace(&self, workspace: &Workspace) -> Result<Action, ControllerError> {
        let name = workspace
            .metadata
            .name
            .clone()
            .ok_or_else(|| ControllerError::InvalidConfig("Workspace missing name".to_string()))?;
        let namespace = workspace.metadata.namespace.as_deref().unwrap_or("default");
        let key = ObjectKey::new(namespace, name.clone());

        info!("Reconciling Workspace {}", key);

        if workspace.metadata.deletion_timestamp.is_some() {
            let (status, deletion) = plan_workspace_deletion(
                self.client.as_ref(),
                &self.workspace_cache,
                &self.requeue,
                &key,
                workspace.status.as_ref(),
            )
            .await?;
            if let Some(next) = status {
                apply_status(&self.workspace_api, "Workspace", &name, workspace.status.as_ref(), next)
                    .await?;
            }
            return match deletion {
                Deletion::Complete => {
                    remove_finalizer(&self.workspace_api, workspace, "Workspace").await?;
                    Ok(Action::await_change())
                }
                Deletion::InProgress(delay) => Ok(Action::requeue(delay)),
            };
        }

        ensure_finalizer(&self.workspace_api, workspace, "Workspace").await?;

        let (next, action) = plan_workspace(
            self.client.as_ref(),
            &self.workspace_cache,
            &self.requeue,
            &key,
            &workspace.spec,
            workspace.status.as_ref(),
            workspace.metadata.generation,
        )
        .await?;
        apply_status(&self.workspace_api, "Workspace", &name, workspace.status.as_ref(), next).await?;
        Ok(action.into_action())
    }
}
