//! LoggingConfiguration reconciler
//!
//! A singleton per workspace, like the alert manager definition, but its one
//! mutable field is the destination log group. Rerouting the log group is a
//! synchronous remote operation; the reconciler still honors whatever status
//! the update call returns, so a service that settles the change
//! asynchronously is polled like any other transient state.

use super::Reconciler;
use super::{
    Deletion, REASON_CREATING, REASON_CREATION_FAILED, REASON_DELETING, REASON_SPEC_CHANGED,
    REASON_SYNCED, REASON_UPDATE_FAILED, REASON_UPDATING, ReconcileAction, apply_status,
    ensure_finalizer, poll_interval, record_removed_out_of_band, record_retry, record_terminal,
    remove_finalizer, to_crd_status,
};
use crate::config::RequeueConfig;
use crate::error::ControllerError;
use crate::observed::{ObjectKey, ObservedCache};
use crds::{LoggingConfiguration, LoggingConfigurationSpec, LoggingConfigurationStatus, conditions};
use kube_runtime::controller::Action;
use metrics_client::{LoggingConfigurationMetadata, MetricsClientTrait};
use tracing::{debug, info, warn};

fn converged(spec: &LoggingConfigurationSpec, observed: &LoggingConfigurationMetadata) -> bool {
    observed.status.status_code == metrics_client::StatusCode::Active
        && spec.log_group_arn == observed.log_group_arn
}

/// Computes the next status and scheduling decision for a live
/// LoggingConfiguration CR.
pub(crate) async fn plan_logging_configuration(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<LoggingConfigurationMetadata>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &LoggingConfigurationSpec,
    current: Option<&LoggingConfigurationStatus>,
    generation: Option<i64>,
) -> Result<(LoggingConfigurationStatus, ReconcileAction), ControllerError> {
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
        debug!("LoggingConfiguration {} already converged, skipping remote read", key);
        return Ok((next, ReconcileAction::AwaitChange));
    }

    let metadata = match client.describe_logging_configuration(&spec.workspace_id).await {
        Ok(metadata) => metadata,
        Err(err) if err.is_not_found() => {
            warn!(
                "LoggingConfiguration {} (workspace {}) no longer exists remotely",
                key, spec.workspace_id
            );
            cache.invalidate(key);
            let action = record_removed_out_of_band(
                &mut next,
                format!(
                    "logging configuration of workspace {} was removed outside the controller",
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

    let code = to_crd_status(metadata.status.status_code);
    next.status_code = Some(code);
    next.status_reason = metadata.status.status_reason.clone();
    next.log_group_arn = Some(metadata.log_group_arn.clone());
    next.workspace = Some(metadata.workspace.clone());

    match code {
        crds::StatusCode::Creating | crds::StatusCode::Updating | crds::StatusCode::Deleting => {
            cache.record_observation(key, metadata);
            let reason = match code {
                crds::StatusCode::Updating => REASON_UPDATING,
                crds::StatusCode::Deleting => REASON_DELETING,
                _ => REASON_CREATING,
            };
            conditions::set_synced(
                &mut next.conditions,
                false,
                reason,
                format!("logging configuration is {}", code.as_str()),
            );
            Ok((next, ReconcileAction::RequeueAfter(poll_interval(requeue, code))))
        }
        crds::StatusCode::CreationFailed | crds::StatusCode::UpdateFailed => {
            if spec_changed && spec.log_group_arn != metadata.log_group_arn {
                return submit_log_group(client, cache, requeue, key, spec, next).await;
            }
            cache.record_observation(key, metadata);
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
            if spec.log_group_arn != metadata.log_group_arn {
                return submit_log_group(client, cache, requeue, key, spec, next).await;
            }
            cache.record_observation(key, metadata);
            conditions::set_synced(
                &mut next.conditions,
                true,
                REASON_SYNCED,
                "logging configuration is active and matches the desired state",
            );
            Ok((next, ReconcileAction::AwaitChange))
        }
    }
}

/// Creation path. Keyed by the workspace, so after an ambiguous earlier
/// attempt the controller describes first and adopts what it finds.
async fn plan_creation(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<LoggingConfigurationMetadata>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &LoggingConfigurationSpec,
    mut next: LoggingConfigurationStatus,
) -> Result<(LoggingConfigurationStatus, ReconcileAction), ControllerError> {
    if cache.error_count(key) > 0 {
        match client.describe_logging_configuration(&spec.workspace_id).await {
            Ok(metadata) => {
                info!(
                    "LoggingConfiguration {} adopting remote configuration of workspace {} after ambiguous create",
                    key, spec.workspace_id
                );
                cache.clear_errors(key);
                next.status_code = Some(to_crd_status(metadata.status.status_code));
                next.status_reason = metadata.status.status_reason.clone();
                next.log_group_arn = Some(metadata.log_group_arn.clone());
                next.workspace = Some(metadata.workspace.clone());
                cache.record_observation(key, metadata);
                conditions::set_synced(
                    &mut next.conditions,
                    false,
                    REASON_CREATING,
                    "adopted existing logging configuration, waiting for it to settle",
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
        .create_logging_configuration(&spec.workspace_id, &spec.log_group_arn)
        .await
    {
        Ok(created) => {
            info!(
                "Created logging configuration for workspace {}",
                spec.workspace_id
            );
            cache.clear_errors(key);
            next.status_code = Some(to_crd_status(created.status.status_code));
            next.status_reason = created.status.status_reason;
            conditions::set_synced(
                &mut next.conditions,
                false,
                REASON_CREATING,
                "logging configuration creation accepted",
            );
            Ok((next, ReconcileAction::RequeueAfter(requeue.while_creating)))
        }
        Err(err) if err.is_retryable() => {
            let delay = record_retry(cache, key, requeue, &mut next, &err);
            Ok((next, ReconcileAction::RequeueAfter(delay)))
        }
        Err(err) => {
            warn!("LoggingConfiguration {} creation rejected: {}", key, err);
            let action = record_terminal(&mut next, &err);
            Ok((next, action))
        }
    }
}

/// Pushes the desired log group. The remote service applies this in place;
/// when it reports a transient status anyway, the object is polled like any
/// other in-flight change.
async fn submit_log_group(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<LoggingConfigurationMetadata>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &LoggingConfigurationSpec,
    mut next: LoggingConfigurationStatus,
) -> Result<(LoggingConfigurationStatus, ReconcileAction), ControllerError> {
    match client
        .update_logging_configuration(&spec.workspace_id, &spec.log_group_arn)
        .await
    {
        Ok(response) => {
            info!("Updated log group for logging configuration {}", key);
            cache.clear_errors(key);
            cache.invalidate(key);
            let code = to_crd_status(response.status.status_code);
            next.status_code = Some(code);
            next.status_reason = response.status.status_reason;
            if code.is_transient() {
                conditions::set_synced(
                    &mut next.conditions,
                    false,
                    REASON_UPDATING,
                    "log group update submitted, waiting for the service to apply it",
                );
                Ok((next, ReconcileAction::RequeueAfter(requeue.while_updating)))
            } else {
                next.log_group_arn = Some(spec.log_group_arn.clone());
                conditions::set_synced(
                    &mut next.conditions,
                    true,
                    REASON_SYNCED,
                    "logging configuration is active and matches the desired state",
                );
                Ok((next, ReconcileAction::AwaitChange))
            }
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
pub(crate) async fn plan_logging_configuration_deletion(
    client: &dyn MetricsClientTrait,
    cache: &ObservedCache<LoggingConfigurationMetadata>,
    requeue: &RequeueConfig,
    key: &ObjectKey,
    spec: &LoggingConfigurationSpec,
    current: Option<&LoggingConfigurationStatus>,
) -> Result<(Option<LoggingConfigurationStatus>, Deletion), ControllerError> {
    let Some(mut next) = current.cloned() else {
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    };
    if next.status_code.is_none() {
        cache.remove(key);
        return Ok((None, Deletion::Complete));
    }

    if next.status_code == Some(crds::StatusCode::Deleting) {
        return match client.describe_logging_configuration(&spec.workspace_id).await {
            Err(err) if err.is_not_found() => {
                info!("LoggingConfiguration {} confirmed deleted", key);
                cache.remove(key);
                Ok((None, Deletion::Complete))
            }
            Ok(metadata) => {
                next.status_code = Some(to_crd_status(metadata.status.status_code));
                next.status_reason = metadata.status.status_reason;
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

    match client.delete_logging_configuration(&spec.workspace_id).await {
        Ok(()) => {
            info!("Deletion of logging configuration {} accepted", key);
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
    /// Reconciles a LoggingConfiguration resource.
    pub async fn reconcile_logging_configuration(
        &self,
        logging_configuration: &LoggingConfiguration,
    ) -> Result<Action, ControllerError> {
        let name = logging_configuration.metadata.name.clone().ok_or_else(|| {
            ControllerError::InvalidConfig("LoggingConfiguration missing name".to_string())
        })?;
        let namespace = logging_configuration
            .metadata
            .namespace
            .as_deref()
            .unwrap_or("default");
        let key = ObjectKey::new(namespace, name.clone());

        info!("Reconciling LoggingConfiguration {}", key);

        if logging_configuration.metadata.deletion_timestamp.is_some() {
            let (status, deletion) = plan_logging_configuration_deletion(
                self.client.as_ref(),
                &self.logging_configuration_cache,
                &self.requeue,
                &key,
                &logging_configuration.spec,
                logging_configuration.status.as_ref(),
            )
            .await?;
            if let Some(next) = status {
                apply_status(
                    &self.logging_configuration_api,
                    "LoggingConfiguration",
                    &name,
                    logging_configuration.status.as_ref(),
                    next,
                )
                .await?;
            }
            return match deletion {
                Deletion::Complete => {
                    remove_finalizer(
                        &self.logging_configuration_api,
                        logging_configuration,
                        "LoggingConfiguration",
                    )
                    .await?;
                    Ok(Action::await_change())
                }
                Deletion::InProgress(delay) => Ok(Action::requeue(delay)),
            };
        }

        ensure_finalizer(
            &self.logging_configuration_api,
            logging_configuration,
            "LoggingConfiguration",
        )
        .await?;

        let (next, action) = plan_logging_configuration(
            self.client.as_ref(),
            &self.logging_configuration_cache,
            &self.requeue,
            &key,
            &logging_configuration.spec,
            logging_configuration.status.as_ref(),
            logging_configuration.metadata.generation,
        )
        .await?;
        apply_status(
            &self.logging_configuration_api,
            "LoggingConfiguration",
            &name,
            logging_configuration.status.as_ref(),
            next,
        )
        .await?;
        Ok(action.into_action())
    }
}
