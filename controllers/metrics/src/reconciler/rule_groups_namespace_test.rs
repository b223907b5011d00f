//! Unit tests for the RuleGroupsNamespace reconciler

#[cfg(test)]
mod tests {
    use crate::config::RequeueConfig;
    use crate::observed::{ObjectKey, ObservedCache};
    use crate::reconciler::rule_groups_namespace::{
        plan_rule_groups_namespace, plan_rule_groups_namespace_deletion,
    };
    use crate::reconciler::{Deletion, ReconcileAction};
    use crds::{RuleGroupsNamespaceSpec, RuleGroupsNamespaceStatus, conditions};
    use metrics_client::{MetricsClientTrait, MockMetricsClient};
    use std::collections::BTreeMap;

    const VALID_RULES: &str =
        "groups:\n  - name: example\n    rules:\n      - record: up:sum\n        expr: sum(up)\n";
    const OTHER_RULES: &str =
        "groups:\n  - name: example\n    rules:\n      - record: up:count\n        expr: count(up)\n";
    const INVALID_RULES: &str = "groups: [unclosed\n";

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

    fn spec(workspace_id: &str, name: &str, configuration: &str) -> RuleGroupsNamespaceSpec {
        RuleGroupsNamespaceSpec {
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            configuration: configuration.to_string(),
            tags: None,
        }
    }

    /// Runs the plan until the action settles to AwaitChange, with a bound
    /// on the number of passes.
    async fn plan_until_stable(
        client: &MockMetricsClient,
        cache: &ObservedCache<metrics_client::RuleGroupsNamespaceDescription>,
        requeue: &RequeueConfig,
        key: &ObjectKey,
        spec: &RuleGroupsNamespaceSpec,
        mut status: Option<RuleGroupsNamespaceStatus>,
        generation: i64,
    ) -> RuleGroupsNamespaceStatus {
        for _ in 0..10 {
            let (next, action) = plan_rule_groups_namespace(
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
        panic!("rule groups namespace did not stabilize within 10 passes");
    }

    #[tokio::test]
    async fn test_configuration_round_trip() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "recording");
        let spec = spec(&workspace_id, "recording", VALID_RULES);

        // Creation is accepted and polled while transient
        let (status, action) =
            plan_rule_groups_namespace(&client, &cache, &requeue, &key, &spec, None, Some(1))
                .await
                .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Creating));
        assert!(status.arn.is_some());
        assert!(!conditions::is_synced(&status.conditions));
        assert_eq!(action, ReconcileAction::RequeueAfter(requeue.while_creating));

        let status = plan_until_stable(&client, &cache, &requeue, &key, &spec, Some(status), 1).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert!(conditions::is_synced(&status.conditions));
        // The accepted configuration reads back byte-for-byte
        assert_eq!(status.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_name_collision_is_terminal_and_first_owner_unaffected() {
        let client = MockMetricsClient::new("http://mock");
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;

        // First CR claims the name and settles
        let cache_a = ObservedCache::new();
        let key_a = ObjectKey::new("default", "first");
        let spec_a = spec(&workspace_id, "shared-name", VALID_RULES);
        let status_a = plan_until_stable(&client, &cache_a, &requeue, &key_a, &spec_a, None, 1).await;
        assert_eq!(status_a.status_code, Some(crds::StatusCode::Active));

        // Second CR with the same remote name: the service rejects the
        // create with a conflict, which is terminal for this object
        let cache_b = ObservedCache::new();
        let key_b = ObjectKey::new("default", "second");
        let spec_b = spec(&workspace_id, "shared-name", OTHER_RULES);
        let (status_b, action) =
            plan_rule_groups_namespace(&client, &cache_b, &requeue, &key_b, &spec_b, None, Some(1))
                .await
                .unwrap();
        assert!(conditions::is_terminal(&status_b.conditions));
        assert!(!conditions::is_synced(&status_b.conditions));
        assert_eq!(action, ReconcileAction::AwaitChange);

        // Further passes without a spec change never move it
        let (status_b, action) = plan_rule_groups_namespace(
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

        // The first owner keeps serving its configuration untouched
        let (status_a, _) = plan_rule_groups_namespace(
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
        assert_eq!(status_a.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_creation_failed_then_healed_by_spec_change() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "broken");
        let bad_spec = spec(&workspace_id, "broken", INVALID_RULES);

        // The invalid blob settles into CREATION_FAILED. The failure is a
        // stable, accurately reported state: Synced is true and nothing is
        // retried until the user submits a new configuration.
        let status = plan_until_stable(&client, &cache, &requeue, &key, &bad_spec, None, 1).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::CreationFailed));
        assert!(conditions::is_synced(&status.conditions));
        assert!(!conditions::is_terminal(&status.conditions));
        // Nothing was ever accepted
        assert!(status.data.is_none());

        // Same spec, another pass: stays put
        let (status, action) = plan_rule_groups_namespace(
            &client,
            &cache,
            &requeue,
            &key,
            &bad_spec,
            Some(&status),
            Some(1),
        )
        .await
        .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::CreationFailed));
        assert_eq!(action, ReconcileAction::AwaitChange);

        // A new valid configuration heals the namespace through the upsert
        let good_spec = spec(&workspace_id, "broken", VALID_RULES);
        let (status, action) = plan_rule_groups_namespace(
            &client,
            &cache,
            &requeue,
            &key,
            &good_spec,
            Some(&status),
            Some(2),
        )
        .await
        .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Updating));
        assert!(!conditions::is_synced(&status.conditions));
        assert!(matches!(action, ReconcileAction::RequeueAfter(_)));

        let status =
            plan_until_stable(&client, &cache, &requeue, &key, &good_spec, Some(status), 2).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert!(conditions::is_synced(&status.conditions));
        assert_eq!(status.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_accepted_data_in_status() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "rules");
        let good_spec = spec(&workspace_id, "rules", VALID_RULES);

        let status = plan_until_stable(&client, &cache, &requeue, &key, &good_spec, None, 1).await;
        assert_eq!(status.data.as_deref(), Some(VALID_RULES));

        // Update with an invalid blob: the service settles to UPDATE_FAILED
        // and keeps serving the previously accepted configuration. The spec
        // and the status data lawfully diverge.
        let bad_spec = spec(&workspace_id, "rules", INVALID_RULES);
        let status =
            plan_until_stable(&client, &cache, &requeue, &key, &bad_spec, Some(status), 2).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::UpdateFailed));
        assert!(conditions::is_synced(&status.conditions));
        assert_eq!(status.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_external_drift_is_corrected_from_observed_state() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "drifting");
        let spec = spec(&workspace_id, "drifting", VALID_RULES);

        let status = plan_until_stable(&client, &cache, &requeue, &key, &spec, None, 1).await;
        assert_eq!(status.data.as_deref(), Some(VALID_RULES));

        // Another actor rewrites the remote configuration
        client
            .put_rule_groups_namespace(&workspace_id, "drifting", OTHER_RULES)
            .await
            .unwrap();
        let _ = client.describe_rule_groups_namespace(&workspace_id, "drifting").await;
        let _ = client.describe_rule_groups_namespace(&workspace_id, "drifting").await;

        // After a restart (empty cache) the diff runs against the latest
        // observed remote state and pushes the desired blob back
        cache.remove(&key);
        let status =
            plan_until_stable(&client, &cache, &requeue, &key, &spec, Some(status), 1).await;
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert_eq!(status.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_deletion_polls_until_not_found() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let workspace_id = active_workspace(&client).await;
        let key = ObjectKey::new("default", "doomed");
        let spec = spec(&workspace_id, "doomed", VALID_RULES);

        let status = plan_until_stable(&client, &cache, &requeue, &key, &spec, None, 1).await;

        let (status, deletion) = plan_rule_groups_namespace_deletion(
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

        let (status, _) = plan_rule_groups_namespace_deletion(
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

        let (status, deletion) = plan_rule_groups_namespace_deletion(
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

        let gone = client
            .describe_rule_groups_namespace(&workspace_id, "doomed")
            .await;
        assert!(gone.is_err());
    }
}
