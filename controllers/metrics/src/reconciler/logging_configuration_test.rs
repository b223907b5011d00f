//! Unit tests for the LoggingConfiguration reconciler

#[cfg(test)]
mod tests {
    use crate::config::RequeueConfig;
    use crate::observed::{ObjectKey, ObservedCache};
    use crate::reconciler::logging_configuration::{
        plan_logging_configuration, plan_logging_configuration_deletion,
    };
    use crate::reconciler::{Deletion, ReconcileAction};
    use crds::{LoggingConfigurationSpec, LoggingConfigurationStatus, conditions};
    use metrics_client::{MetricsClientTrait, MockMetricsClient};
    use std::collections::BTreeMap;

    const LOG_GROUP_ONE: &str = "arn:logs::group/one";
    const LOG_GROUP_TWO: &str = "arn:logs::group/two";

    async fn active_workspace(client: &MockMetricsClient) -> String {
        let created = client
            .create_workspace(Some("test"), &BTreeMap::new())
            .await
            .unwrap();
        let _ = client.describe_workspace(&created.workspace_id).await.unwrap();
        let ws = client.describe_workspace(&created.workspace_id).await.unwrap();
        assert_eq!(ws.status.status_code, metrics_client::StatusCode::Active);
        created.workspace_id
    }

    fn spec(workspace_id: &str, log_group_arn: &str) -> LoggingConfigurationSpec {
        LoggingConfigurationSpec {
            workspace_id: workspace_id.to_string(),
            log_group_arn: log_group_arn.to_string(),
        }
    }

    async fn plan_until_stable(
        client: &MockMetricsClient,
        cache: &ObservedCache<metrics_client::LoggingConfigurationMetadata>,
        requeue: &RequeueConfig,
        key: &ObjectKey,
        spec: &LoggingConfigurationSpec,
        mut status: Option<LoggingConfigurationStatus>,
        generation: i64,
    ) -> LoggingConfigurationStatus {
        for _ in 0..10 {
            let (next, action) = plan_logging_configuration(
                client,
                cache,
                requeue,
                key,
                spec,
                status.as_ref(),
                Some(generation),
            )
            .await
            .unwrap();
            status = Some(next);
            if action == ReconcileAction::AwaitChange {
                return status.unwrap();
            }
        }
        panic!("logging configuration did not stabilize within 10 passes");
    }

    #[tokio::test]
    async fn test_create_polls_to_active_with_read_back() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "logging");
        let spec = spec(&workspace_id, LOG_GROUP_ONE);

        let (status, action) =
            plan_logging_configuration(&client, &cache, &requeue, &key, &spec, None, Some(1))
                .await
                .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Creating));
        assert!(!conditions::is_synced(&status.conditions));
        assert_eq!(action, ReconcileAction::RequeueAfter(requeue.while_creating));

        let status = plan_until_stable(&client, &cache, &requeue, &key, &spec, Some(status), 1).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert!(conditions::is_synced(&status.conditions));
        assert_eq!(status.log_group_arn.as_deref(), Some(LOG_GROUP_ONE));
        assert_eq!(status.workspace.as_deref(), Some(workspace_id.as_str()));
    }

    #[tokio::test]
    async fn test_log_group_change_applies_synchronously() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "logging");
        let initial = spec(&workspace_id, LOG_GROUP_ONE);

        let status = plan_until_stable(&client, &cache, &requeue, &key, &initial, None, 1).await;

        // Rerouting the log group applies in place: one pass, no transient
        // status, Synced stays true
        let desired = spec(&workspace_id, LOG_GROUP_TWO);
        let (status, action) = plan_logging_configuration(
            &client,
            &cache,
            &requeue,
            &key,
            &desired,
            Some(&status),
            Some(2),
        )
        .await
        .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert!(conditions::is_synced(&status.conditions));
        assert_eq!(status.log_group_arn.as_deref(), Some(LOG_GROUP_TWO));
        assert_eq!(action, ReconcileAction::AwaitChange);

        let remote = client.describe_logging_configuration(&workspace_id).await.unwrap();
        assert_eq!(remote.log_group_arn, LOG_GROUP_TWO);
    }

    #[tokio::test]
    async fn test_empty_log_group_is_terminal() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "logging");
        let spec = spec(&workspace_id, "");

        // The service rejects the request synchronously as invalid
        let (status, action) =
            plan_logging_configuration(&client, &cache, &requeue, &key, &spec, None, Some(1))
                .await
                .unwrap();
        assert!(conditions::is_terminal(&status.conditions));
        assert!(!conditions::is_synced(&status.conditions));
        assert_eq!(action, ReconcileAction::AwaitChange);
    }

    #[tokio::test]
    async fn test_deletion_polls_until_not_found() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "logging");
        let spec = spec(&workspace_id, LOG_GROUP_ONE);

        let status = plan_until_stable(&client, &cache, &requeue, &key, &spec, None, 1).await;

        let (status, deletion) = plan_logging_configuration_deletion(
            &client,
            &cache,
            &requeue,
            &key,
            &spec,
            Some(&status),
        )
        .await
        .unwrap();
        let status = status.unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Deleting));
        assert!(matches!(deletion, Deletion::InProgress(_)));

        let (status, _) = plan_logging_configuration_deletion(
            &client,
            &cache,
            &requeue,
            &key,
            &spec,
            Some(&status),
        )
        .await
        .unwrap();
        let status = status.unwrap();

        let (status, deletion) = plan_logging_configuration_deletion(
            &client,
            &cache,
            &requeue,
            &key,
            &spec,
            Some(&status),
        )
        .await
        .unwrap();
        assert!(status.is_none());
        assert_eq!(deletion, Deletion::Complete);
    }
}
