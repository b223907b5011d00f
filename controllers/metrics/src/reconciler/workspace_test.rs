//! Unit tests for the Workspace reconciler

#[cfg(test)]
mod tests {
    use crate::config::RequeueConfig;
    use crate::observed::{ObjectKey, ObservedCache};
    use crate::reconciler::workspace::{plan_workspace, plan_workspace_deletion};
    use crate::reconciler::{Deletion, ReconcileAction};
    use crds::{WorkspaceSpec, conditions};
    use metrics_client::{MetricsClientTrait, MockMetricsClient};
    use std::collections::BTreeMap;

    fn spec(alias: &str, tags: &[(&str, &str)]) -> WorkspaceSpec {
        WorkspaceSpec {
            alias: Some(alias.to_string()),
            tags: if tags.is_empty() {
                None
            } else {
                Some(
                    tags.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                )
            },
        }
    }

    #[tokio::test]
    async fn test_create_then_poll_to_active() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let key = ObjectKey::new("default", "ws-a");
        let spec = spec("team-a", &[("env", "test")]);

        // First pass: no remote identity, issue the create
        let (status, action) = plan_workspace(&client, &cache, &requeue, &key, &spec, None, Some(1))
            .await
            .unwrap();
        assert!(status.workspace_id.is_some());
        assert_eq!(status.status_code, Some(crds::StatusCode::Creating));
        assert!(!conditions::is_synced(&status.conditions));
        assert_eq!(action, ReconcileAction::RequeueAfter(requeue.while_creating));

        // Second pass: still settling, keep polling
        let (status, action) =
            plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
                .await
                .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Creating));
        assert!(!conditions::is_synced(&status.conditions));
        assert!(matches!(action, ReconcileAction::RequeueAfter(_)));

        // Third pass: the service settled the workspace, Synced flips the
        // instant ACTIVE is observed and polling stops
        let (status, action) =
            plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
                .await
                .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert!(conditions::is_synced(&status.conditions));
        assert!(!conditions::is_terminal(&status.conditions));
        assert_eq!(action, ReconcileAction::AwaitChange);
    }

    #[tokio::test]
    async fn test_converged_workspace_skips_remote_read() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let key = ObjectKey::new("default", "ws-b");
        let spec = spec("team-b", &[]);

        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, None, Some(1))
            .await
            .unwrap();
        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
            .await
            .unwrap();
        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
            .await
            .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));

        // Same generation, cached observation matches the spec: the plan
        // settles without touching the service again
        let (status, action) =
            plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
                .await
                .unwrap();
        assert_eq!(action, ReconcileAction::AwaitChange);
        assert!(conditions::is_synced(&status.conditions));
    }

    #[tokio::test]
    async fn test_alias_and_tag_changes_apply_in_place() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let key = ObjectKey::new("default", "ws-c");
        let initial = spec("before", &[("k1", "v1"), ("k2", "v2")]);

        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &initial, None, Some(1))
            .await
            .unwrap();
        let (status, _) =
            plan_workspace(&client, &cache, &requeue, &key, &initial, Some(&status), Some(1))
                .await
                .unwrap();
        let (status, _) =
            plan_workspace(&client, &cache, &requeue, &key, &initial, Some(&status), Some(1))
                .await
                .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));

        // New alias and a tag overlay: applied synchronously, no transient
        // status, Synced stays true at the end of the pass
        let desired = spec("after", &[("k1", "v1_updated"), ("k3", "v3")]);
        let (status, action) =
            plan_workspace(&client, &cache, &requeue, &key, &desired, Some(&status), Some(2))
                .await
                .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));
        assert!(conditions::is_synced(&status.conditions));
        assert_eq!(action, ReconcileAction::AwaitChange);

        let remote = client
            .describe_workspace(status.workspace_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(remote.alias.as_deref(), Some("after"));
        let mut expected = BTreeMap::new();
        expected.insert("k1".to_string(), "v1_updated".to_string());
        expected.insert("k3".to_string(), "v3".to_string());
        assert_eq!(remote.tags, expected);
    }

    #[tokio::test]
    async fn test_out_of_band_removal_is_terminal_not_recreated() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let key = ObjectKey::new("default", "ws-d");
        let spec = spec("team-d", &[]);

        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, None, Some(1))
            .await
            .unwrap();
        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
            .await
            .unwrap();
        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
            .await
            .unwrap();
        let workspace_id = status.workspace_id.clone().unwrap();

        // Someone deletes the workspace behind the controller's back
        client.delete_workspace(&workspace_id).await.unwrap();
        let _ = client.describe_workspace(&workspace_id).await;
        assert!(client.describe_workspace(&workspace_id).await.is_err());

        // A spec change forces a re-read, which finds the workspace gone.
        // The controller reports the divergence and does not recreate.
        let (status, action) =
            plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(2))
                .await
                .unwrap();
        assert!(conditions::is_terminal(&status.conditions));
        assert!(!conditions::is_synced(&status.conditions));
        assert_eq!(action, ReconcileAction::AwaitChange);
        assert_eq!(status.workspace_id.as_deref(), Some(workspace_id.as_str()));
    }

    #[tokio::test]
    async fn test_deletion_polls_until_not_found() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let key = ObjectKey::new("default", "ws-e");
        let spec = spec("team-e", &[]);

        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, None, Some(1))
            .await
            .unwrap();
        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
            .await
            .unwrap();
        let (status, _) = plan_workspace(&client, &cache, &requeue, &key, &spec, Some(&status), Some(1))
            .await
            .unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Active));

        // Pass 1: issue the delete, remote flips to DELETING
        let (status, deletion) =
            plan_workspace_deletion(&client, &cache, &requeue, &key, Some(&status))
                .await
                .unwrap();
        let status = status.unwrap();
        assert_eq!(status.status_code, Some(crds::StatusCode::Deleting));
        assert!(!conditions::is_synced(&status.conditions));
        assert!(matches!(deletion, Deletion::InProgress(_)));

        // Pass 2: remote still deleting
        let (status, deletion) =
            plan_workspace_deletion(&client, &cache, &requeue, &key, Some(&status))
                .await
                .unwrap();
        let status = status.unwrap();
        assert!(matches!(deletion, Deletion::InProgress(_)));

        // Pass 3: the read reports not found, the object can be finalized
        let (status, deletion) =
            plan_workspace_deletion(&client, &cache, &requeue, &key, Some(&status))
                .await
                .unwrap();
        assert!(status.is_none());
        assert_eq!(deletion, Deletion::Complete);
    }

    #[tokio::test]
    async fn test_deletion_without_remote_identity_completes_immediately() {
        let client = MockMetricsClient::new("http://mock");
        let cache = ObservedCache::new();
        let requeue = RequeueConfig::default();
        let key = ObjectKey::new("default", "ws-f");

        // The CR never made it to the remote service
        let (status, deletion) = plan_workspace_deletion(&client, &cache, &requeue, &key, None)
            .await
            .unwrap();
        assert!(status.is_none());
        assert_eq!(deletion, Deletion::Complete);
    }
}
