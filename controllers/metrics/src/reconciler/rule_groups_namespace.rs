//! RuleGroupsNamespace reconciler
//!
//! Drives a RuleGroupsNamespace CR through creation, polling, configuration
//! updates and deletion. The configuration blob is compared byte-exact
//! against the last accepted remote `data`; a divergence triggers an
//! asynchronous put that is polled to completion. Tag changes apply
//! synchronously. The put call is an upsert, which is also how a namespace
//! heals out of CREATION_FAILED or UPDATE_FAILED once the user submits a new
//! configuration.

use super::Reconciler;
use super::{
    Deletion, REASON_CREATING, REASON_CREATION_FAILED, REASON_DELETING, REASON_SPEC_CHANGED,
    REASON_SYNCED, REASON_UPDATE_FAILED, REASON_UPDATING, ReconcileAction, apply_status,
    ensure_finalizer, poll_interval, record_removed_out_of_band, record_retry, record_terminal,
    remove_finalizer, to_crd_status,
};
use crate::config::RequeueConfig;
use crate::diff::{configuration_differs, diff_tags};
use crate::error::ControllerError;
use crate::observed::{ObjectKey, ObservedCache};
use crds::{RuleGroupsNamespace, RuleGroupsNamespaceSpec, RuleGroupsNamespaceStatus, conditions};
use kube_runtime::controller::Action;
use metrics_client::{MetricsClientTrait, RuleGroupsNamespaceDescription};
use tracing::{debug, info, warn};

/// Whether the cached observation already matches the desired spec.
fn converged(spec: &RuleGroupsNamespaceSpec, observed: &RuleGroupsNamespaceDescription) -> bool {
    observed.status.status_code == metrics_client::StatusCode::Active
        && !configuration_differs(&spec.configuration, observed.data.as_deref())
        && diff_tags(&observed.tags, &spec.tags.clone().unwrap_or_default()).is_empty()
}

/// Computes the next status and scheduling decision for a live
/// RuleGroupsNamespace CR.
pub(crate) async fn plan_rule_groups_namespace(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<RuleGroupsNamespaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &RuleGroupsNamespaceSpec,
    current: Option<&RuleGroupsNamespaceStatus>,
    generation: Option<i64>,
) -> Result<(RuleGroupsNamespaceStatus, ReconcileAction), ControllerError> {
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

    if next.arn.is_none() {
        return plan_creation(client, cache, requeue, key, spec, next).await;
    }

    if !spec_changed
        && next.status_code == Some(crds::StatusCode::Active)
        && conditions::is_synced(&next.conditions)
        && cache.get(key).is_some_and(|entry| converged(spec, &entry.snapshot))
    {
        debug!("RuleGroupsNamespace {} already converged, skipping remote read", key);
        return Ok((next, ReconcileAction::AwaitChange));
    }

    let description = match client
        .describe_rule_groups_namespace(&spec.workspace_id, &spec.name)
        .await
    {
        Ok(description) => description,
        Err(err) if err.is_not_found() => {
            warn!(
                "RuleGroupsNamespace {} ({}/{}) no longer exists remotely",
                key, spec.workspace_id, spec.name
            );
            cache.invalidate(key);
            let action = record_removed_out_of_band(
                &mut next,
                format!(
                    "rule groups namespace {} was removed from workspace {} outside the controller",
                    spec.name, spec.workspace_id
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
                format!("rule groups namespace is {}", code.as_str()),
            );
            Ok((next, ReconcileAction::RequeueAfter(poll_interval(requeue, code))))
        }
        crds::StatusCode::CreationFailed | crds::StatusCode::UpdateFailed => {
            // Heal only on a user-driven spec change; the failed status is
            // otherwise stable and reported as such.
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

            let mut observed = description;
            let desired_tags = spec.tags.clone().unwrap_or_default();
            let tag_diff = diff_tags(&observed.tags, &desired_tags);
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
                info!("Reconciled tags of rule groups namespace {}", key);
            }

            cache.record_observation(key, observed);
            conditions::set_synced(
                &mut next.conditions,
                true,
                REASON_SYNCED,
                "rule groups namespace is active and matches the desired state",
            );
            Ok((next, ReconcileAction::AwaitChange))
        }
    }
}

/// Creation path: nothing recorded remotely for this CR yet.
///
/// The namespace name is a natural key, so after an ambiguous earlier
/// attempt the controller describes first and adopts what it finds rather
/// than re-creating. A conflict on a clean first create means the name is
/// taken by an object the controller does not own, which is terminal.
async fn plan_creation(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<RuleGroupsNamespaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &RuleGroupsNamespaceSpec,
    mut next: RuleGroupsNamespaceStatus,
) -> Result<(RuleGroupsNamespaceStatus, ReconcileAction), ControllerError> {
    if cache.error_count(key) > 0 {
        match client
            .describe_rule_groups_namespace(&spec.workspace_id, &spec.name)
            .await
        {
            Ok(description) => {
                info!(
                    "RuleGroupsNamespace {} adopting remote object {}/{} after ambiguous create",
                    key, spec.workspace_id, spec.name
                );
                cache.clear_errors(key);
                next.arn = Some(description.arn.clone());
                next.status_code = Some(to_crd_status(description.status.status_code));
                next.status_reason = description.status.status_reason.clone();
                next.data = description.data.clone();
                cache.record_observation(key, description);
                conditions::set_synced(
                    &mut next.conditions,
                    false,
                    REASON_CREATING,
                    "adopted existing rule groups namespace, waiting for it to settle",
                );
                return Ok((next, ReconcileAction::RequeueAfter(requeue.while_creating)));
            }
            Err(err) if err.is_not_found() => {
                // The earlier create never took effect; safe to create now.
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

    let desired_tags = spec.tags.clone().unwrap_or_default();
    match client
        .create_rule_groups_namespace(&spec.workspace_id, &spec.name, &spec.configuration, &desired_tags)
        .await
    {
        Ok(created) => {
            info!(
                "Created rule groups namespace {} in workspace {}",
                spec.name, spec.workspace_id
            );
            cache.clear_errors(key);
            next.arn = Some(created.arn);
            next.status_code = Some(to_crd_status(created.status.status_code));
            next.status_reason = created.status.status_reason;
            conditions::set_synced(
                &mut next.conditions,
                false,
                REASON_CREATING,
                "rule groups namespace creation accepted",
            );
            Ok((next, ReconcileAction::RequeueAfter(requeue.while_creating)))
        }
        Err(err) if err.is_retryable() => {
            let delay = record_retry(cache, key, requeue, &mut next, &err);
            Ok((next, ReconcileAction::RequeueAfter(delay)))
        }
        Err(err) => {
            warn!("RuleGroupsNamespace {} creation rejected: {}", key, err);
            let action = record_terminal(&mut next, &err);
            Ok((next, action))
        }
    }
}

/// Pushes the desired configuration with the upsert call and switches the
/// object into the polled UPDATING phase.
async fn submit_configuration(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<RuleGroupsNamespaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &RuleGroupsNamespaceSpec,
    mut next: RuleGroupsNamespaceStatus,
) -> Result<(RuleGroupsNamespaceStatus, ReconcileAction), ControllerError> {
    match client
        .put_rule_groups_namespace(&spec.workspace_id, &spec.name, &spec.configuration)
        .await
    {
        Ok(response) => {
            info!("Submitted configuration for rule groups namespace {}", key);
            cache.clear_errors(key);
            // The snapshot no longer reflects remote state; re-read on the
            // next poll instead of trusting it.
            cache.invalidate(key);
            next.arn = Some(response.arn);
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
pub(crate) async fn plan_rule_groups_namespace_deletion(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<RuleGroupsNamespaceDescription>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &RuleGroupsNamespaceSpec,
    current: Option<&RuleGroupsNamespaceStatus>,
) -> Result<(Option<RuleGroupsNamespaceStatus>, Deletion), ControllerError> {
    let Some(mut next) = current.cloned() else {
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    };
    if next.arn.is_none() {
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    }

    if next.status_code == Some(crds::StatusCode::Deleting) {
        return match client
            .describe_rule_groups_namespace(&spec.workspace_id, &spec.name)
            .await
        {
            Err(err) if err.is_not_found() => {
                info!("RuleGroupsNamespace {} confirmed deleted", key);
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

    match client
        .delete_rule_groups_namespace(&spec.workspace_id, &spec.name)
        .await
    {
        Ok(()) => {
            info!("Deletion of rule groups namespace {} accepted", key);
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
    /// Reconciles a RuleGroupsNamespace resource.
    pub async fn reconcile_rule_groups_namespace(
        &self,
        rule_groups_namespace: &RuleGroupsNamespace,
    ) -> Result<Action, ControllerError> {
        let name = rule_groups_namespace.metadata.name.clone().ok_or_else(|| {
            ControllerError::InvalidConfig("RuleGroupsNamespace missing name".to_string())
        })?;
        let namespace = rule_groups_namespace
            .metadata
            .namespace
            .as_deref()
            .unwrap_or("default");
        let key = ObjectKey::new(namespace, name.clone());

        info!("Reconciling RuleGroupsNamespace {}", key);

        if rule_groups_namespace.metadata.deletion_timestamp.is_some() {
            let (status, deletion) = plan_rule_groups_namespace_deletion(
                self.client.as_ref(),
                &self.rule_groups_namespace_cache,
                &self.requeue,
                &key,
                &rule_groups_namespace.spec,
                rule_groups_namespace.status.as_ref(),
            )
            .await?;
            if let Some(next) = status {
                apply_status(
                    &self.rule_groups_namespace_api,
                    "RuleGroupsNamespace",
                    &name,
                    rule_groups_namespace.status.as_ref(),
                    next,
                )
                .await?;
            }
            return match deletion {
                Deletion::Complete => {
                    remove_finalizer(
                        &self.rule_groups_namespace_api,
                        rule_groups_namespace,
                        "RuleGroupsNamespace",
                    )
                    .await?;
                    Ok(Action::await_change())
                }
                Deletion::InProgress(delay) => Ok(Action::requeue(delay)),
            };
        }

        ensure_finalizer(
            &self.rule_groups_namespace_api,
            rule_groups_namespace,
            "RuleGroupsNamespace",
        )
        .await?;

        let (next, action) = plan_rule_groups_namespace(
            self.client.as_ref(),
            &self.rule_groups_namespace_cache,
            &self.requeue,
            &key,
            &rule_groups_namespace.spec,
            rule_groups_namespace.status.as_ref(),
            rule_groups_namespace.metadata.generation,
        )
        .await?;
        apply_status(
            &self.rule_groups_namespace_api,
            "RuleGroupsNamespace",
            &name,
            rule_groups_namespace.status.as_ref(),
            next,
        )
        .await?;
        Ok(action.into_action())
    }
}
