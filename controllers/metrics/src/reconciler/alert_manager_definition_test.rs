//! Unit tests for the AlertManagerDefinition reconciler

#[cfg(test)]
mod tests {
    use crate::config::RequeueConfig;
    use crate::observed::{ObjectKey, ObservedCache};
    use crate::reconciler::alert_manager_definition::{
        plan_alert_manager_definition, plan_alert_manager_definition_deletion,
    };
    use crate::reconciler::{Deletion, ReconcileAction};
    use crds::{AlertManagerDefinitionSpec, AlertManagerDefinitionStatus, conditions};
    use metrics_client::{MetricsClientTrait, MockMetricsClient};
    use std::collections::BTreeMap;

    const ALERT_CONFIG: &str = "route:\n  receiver: default\nreceivers:\n  - name: default\n";
    const OTHER_CONFIG: &str = "route:\n  receiver: pager\nreceivers:\n  - name: pager\n";

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

    fn spec(workspace_id: &str, configuration: &str) -> AlertManagerDefinitionSpec {
        AlertManagerDefinitionSpec {
            workspace_id: workspace_id.to_string(),
            configuration: configuration.to_string(),
        }
    }

    async fn plan_until_stable(
        client: &MockMetricsClient,
        cache: &ObservedCache<metrics_client::AlertManagerDefinitionDescription>,
        requeue: &RequeueConfig,
        key: &ObjectKey,
        spec: &AlertManagerDefinitionSpec,
        mut status: Option<AlertManagerDefinitionStatus>,
        generation: i64,
    ) -> AlertManagerDefinitionStatus {
        for _ in 0..10 {
            let (next, action) = plan_alert_manager_definition(
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
        panic!("alert manager definition did not stabilize within 10 passes");
    }

    #[tokio::test]
    async fn test_create_poll_and_update_round_trip() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "alerting");
        let initial = spec(&workspace_id, ALERT_CONFIG);

        let status = plan_until_stable(&client, &cache, &requeue, &key, &initial, None, 1).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert!(conditions::is_synced(&status.conditions));
        assert_eq!(status.data.as_deref(), Some(ALERT_CONFIG));

        // A configuration change goes through the asynchronous put
        let desired = spec(&workspace_id, OTHER_CONFIG);
        let (status, action) = plan_alert_manager_definition(
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
        assert_eq!(status.status_code, Some(crds::StatusCode::Updating));
        assert!(!conditions::is_synced(&status.conditions));
        assert!(matches!(action, ReconcileAction::RequeueAfter(_)));

        let status =
            plan_until_stable(&client, &cache, &requeue, &key, &desired, Some(status), 2).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert_eq!(status.data.as_deref(), Some(OTHER_CONFIG));
    }

    #[tokio::test]
    async fn test_duplicate_singleton_is_terminal_while_first_stays_synced() {
        let client = MockMetricsClient::new("http://mock");
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;

        // First definition claims the workspace slot
        let cache_a = ObservedCache::new();
        let key_a = ObjectKey::new("default", "first");
        let spec_a = spec(&workspace_id, ALERT_CONFIG);
        let status_a = plan_until_stable(&client, &cache_a, &requeue, &key_a, &spec_a, None, 1).await;
        assert!(conditions::is_synced(&status_a.conditions));

        // Second definition for the same workspace: rejected terminally
        let cache_b = ObservedCache::new();
        let key_b = ObjectKey::new("default", "second");
        let spec_b = spec(&workspace_id, OTHER_CONFIG);
        let (status_b, action) = plan_alert_manager_definition(
            &client,
            &cache_b,
            &requeue,
            &key_b,
            &spec_b,
            None,
            Some(1),
        )
        .await
        .unwrap();
        assert!(conditions::is_terminal(&status_b.conditions));
        assert!(!conditions::is_synced(&status_b.conditions));
        assert_eq!(action, ReconcileAction::AwaitChange);

        // It never transitions further without a spec change
        let (status_b, action) = plan_alert_manager_definition(
            &client,
            &cache_b,
            &requeue,
            &key_b,
            &spec_b,
            Some(&status_b),
            Some(1),
        )
        .await
        .unwrap();
        assert!(conditions::is_terminal(&status_b.conditions));
        assert_eq!(action, ReconcileAction::AwaitChange);

        // The first definition is untouched
        let (status_a, _) = plan_alert_manager_definition(
            &client,
            &cache_a,
            &requeue,
            &key_a,
            &spec_a,
            Some(&status_a),
            Some(1),
        )
        .await
        .unwrap();
        assert!(conditions::is_synced(&status_a.conditions));
        assert_eq!(status_a.data.as_deref(), Some(ALERT_CONFIG));
    }

    #[tokio::test]
    async fn test_deletion_polls_until_not_found() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "alerting");
        let spec = spec(&workspace_id, ALERT_CONFIG);

        let status = plan_until_stable(&client, &cache, &requeue, &key, &spec, None, 1).await;

        let (status, deletion) = plan_alert_manager_definition_deletion(
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

        let (status, _) = plan_alert_manager_definition_deletion(
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

        let (status, deletion) = plan_alert_manager_definition_deletion(
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
