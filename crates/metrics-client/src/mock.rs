//! Mock metrics client for unit testing
//!
//! An in-memory implementation of `MetricsClientTrait` that behaves like the
//! real control plane without a network: create/update calls return
//! immediately with a transient status, and the resource settles to ACTIVE or
//! a failed status after a configurable number of describe calls.
//!
//! Configuration payloads are validated as YAML mappings when they settle, so
//! tests can drive the CREATION_FAILED / UPDATE_FAILED paths with malformed
//! blobs. Uniqueness rules (rule groups namespace names, singleton
//! definitions) are enforced with conflict errors, matching the live service.

use crate::error::MetricsError;
use crate::metrics_trait::MetricsClientTrait;
use crate::models::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct WorkspaceRecord {
    description: WorkspaceDescription,
    polls_remaining: u32,
}

#[derive(Debug, Clone)]
struct ConfigRecord {
    arn: String,
    status: ResourceStatus,
    /// Last configuration the service durably accepted
    accepted: Option<String>,
    /// Configuration submitted but not yet validated
    pending: Option<String>,
    tags: BTreeMap<String, String>,
    polls_remaining: u32,
}

#[derive(Debug, Clone)]
struct LoggingRecord {
    status: ResourceStatus,
    log_group_arn: String,
    polls_remaining: u32,
}

/// Mock metrics client for testing
#[derive(Clone)]
pub struct MockMetricsClient {
    base_url: String,
    workspaces: Arc<Mutex<HashMap<String, WorkspaceRecord>>>,
    rule_groups: Arc<Mutex<HashMap<(String, String), ConfigRecord>>>,
    alert_managers: Arc<Mutex<HashMap<String, ConfigRecord>>>,
    logging: Arc<Mutex<HashMap<String, LoggingRecord>>>,
    /// Describe calls a transient status survives before settling
    settle_polls: u32,
}

impl std::fmt::Debug for MockMetricsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockMetricsClient")
            .field("base_url", &self.base_url)
            .field("settle_polls", &self.settle_polls)
            .finish_non_exhaustive()
    }
}

/// A configuration blob is accepted when it parses as a YAML mapping.
fn configuration_is_valid(data: &str) -> bool {
    serde_yaml::from_str::<serde_yaml::Mapping>(data).is_ok()
}

impl MockMetricsClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            workspaces: Arc::new(Mutex::new(HashMap::new())),
            rule_groups: Arc::new(Mutex::new(HashMap::new())),
            alert_managers: Arc::new(Mutex::new(HashMap::new())),
            logging: Arc::new(Mutex::new(HashMap::new())),
            settle_polls: 1,
        }
    }

    /// Override how many describe calls a transient status survives
    #[must_use]
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    fn workspace_exists(&self, workspace_id: &str) -> bool {
        self.workspaces.lock().unwrap().contains_key(workspace_id)
    }

    /// Advance a transient config record by one describe call.
    /// Returns true when the record settled out of existence (deletion done).
    fn settle_config(record: &mut ConfigRecord) -> bool {
        if !record.status.status_code.is_transient() {
            return false;
        }
        if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            return false;
        }
        match record.status.status_code {
            StatusCode::Deleting => return true,
            StatusCode::Creating | StatusCode::Updating => {
                let failed_code = if record.status.status_code == StatusCode::Creating {
                    StatusCode::CreationFailed
                } else {
                    StatusCode::UpdateFailed
                };
                let valid = record
                    .pending
                    .as_deref()
                    .is_some_and(configuration_is_valid);
                if valid {
                    record.accepted = record.pending.take();
                    record.status = ResourceStatus::new(StatusCode::Active);
                } else {
                    record.pending = None;
                    record.status = ResourceStatus {
                        status_code: failed_code,
                        status_reason: Some("configuration is not valid YAML".to_string()),
                    };
                }
            }
            _ => {}
        }
        false
    }
}

#[async_trait::async_trait]
impl MetricsClientTrait for MockMetricsClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn validate_connectivity(&self) -> Result<(), MetricsError> {
        Ok(())
    }

    async fn create_workspace(
        &self,
        alias: Option<&str>,
        tags: &BTreeMap<String, String>,
    ) -> Result<CreateWorkspaceResponse, MetricsError> {
        let workspace_id = format!("ws-{}", uuid::Uuid::new_v4());
        let arn = format!("arn:metrics::workspace/{workspace_id}");
        let status = ResourceStatus::new(StatusCode::Creating);
        let record = WorkspaceRecord {
            description: WorkspaceDescription {
                workspace_id: workspace_id.clone(),
                arn: arn.clone(),
                alias: alias.map(str::to_string),
                status: status.clone(),
                tags: tags.clone(),
                created_at: Some(chrono::Utc::now()),
            },
            polls_remaining: self.settle_polls,
        };
        self.workspaces
            .lock()
            .unwrap()
            .insert(workspace_id.clone(), record);
        Ok(CreateWorkspaceResponse {
            workspace_id,
            arn,
            status,
        })
    }

    async fn describe_workspace(&self, workspace_id: &str) -> Result<WorkspaceDescription, MetricsError> {
        let mut workspaces = self.workspaces.lock().unwrap();
        let deletion_settled = {
            let record = workspaces
                .get_mut(workspace_id)
                .ok_or_else(|| MetricsError::NotFound(format!("workspace {workspace_id} not found")))?;
            if !record.description.status.status_code.is_transient() {
                false
            } else if record.polls_remaining > 0 {
                record.polls_remaining -= 1;
                false
            } else if record.description.status.status_code == StatusCode::Deleting {
                true
            } else {
                record.description.status = ResourceStatus::new(StatusCode::Active);
                false
            }
        };

        if deletion_settled {
            workspaces.remove(workspace_id);
            drop(workspaces);
            // Cascade: children of a deleted workspace are gone too
            self.rule_groups
                .lock()
                .unwrap()
                .retain(|(ws, _), _| ws != workspace_id);
            self.alert_managers.lock().unwrap().remove(workspace_id);
            self.logging.lock().unwrap().remove(workspace_id);
            return Err(MetricsError::NotFound(format!(
                "workspace {workspace_id} not found"
            )));
        }
        Ok(workspaces[workspace_id].description.clone())
    }

    async fn list_workspaces(&self, alias: Option<&str>) -> Result<Vec<WorkspaceSummary>, MetricsError> {
        let workspaces = self.workspaces.lock().unwrap();
        Ok(workspaces
            .values()
            .filter(|r| alias.is_none() || r.description.alias.as_deref() == alias)
            .map(|r| WorkspaceSummary {
                workspace_id: r.description.workspace_id.clone(),
                arn: r.description.arn.clone(),
                alias: r.description.alias.clone(),
                status: r.description.status.clone(),
            })
            .collect())
    }

    async fn update_workspace_alias(
        &self,
        workspace_id: &str,
        alias: Option<&str>,
    ) -> Result<(), MetricsError> {
        let mut workspaces = self.workspaces.lock().unwrap();
        let record = workspaces
            .get_mut(workspace_id)
            .ok_or_else(|| MetricsError::NotFound(format!("workspace {workspace_id} not found")))?;
        if record.description.status.status_code != StatusCode::Active {
            return Err(MetricsError::Conflict(format!(
                "workspace {workspace_id} is not active"
            )));
        }
        record.description.alias = alias.map(str::to_string);
        Ok(())
    }

    async fn delete_workspace(&self, workspace_id: &str) -> Result<(), MetricsError> {
        let mut workspaces = self.workspaces.lock().unwrap();
        let record = workspaces
            .get_mut(workspace_id)
            .ok_or_else(|| MetricsError::NotFound(format!("workspace {workspace_id} not found")))?;
        record.description.status = ResourceStatus::new(StatusCode::Deleting);
        record.polls_remaining = self.settle_polls;
        Ok(())
    }

    async fn create_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        data: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<CreateRuleGroupsNamespaceResponse, MetricsError> {
        if !self.workspace_exists(workspace_id) {
            return Err(MetricsError::NotFound(format!(
                "workspace {workspace_id} not found"
            )));
        }
        let key = (workspace_id.to_string(), name.to_string());
        let mut rule_groups = self.rule_groups.lock().unwrap();
        if rule_groups.contains_key(&key) {
            return Err(MetricsError::Conflict(format!(
                "rule groups namespace {name} already exists in workspace {workspace_id}"
            )));
        }
        let arn = format!("arn:metrics::rulegroupsnamespace/{workspace_id}/{name}");
        let status = ResourceStatus::new(StatusCode::Creating);
        rule_groups.insert(
            key,
            ConfigRecord {
                arn: arn.clone(),
                status: status.clone(),
                accepted: None,
                pending: Some(data.to_string()),
                tags: tags.clone(),
                polls_remaining: self.settle_polls,
            },
        );
        Ok(CreateRuleGroupsNamespaceResponse {
            name: name.to_string(),
            arn,
            status,
        })
    }

    async fn describe_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> Result<RuleGroupsNamespaceDescription, MetricsError> {
        let key = (workspace_id.to_string(), name.to_string());
        let mut rule_groups = self.rule_groups.lock().unwrap();
        let record = rule_groups.get_mut(&key).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "rule groups namespace {name} not found in workspace {workspace_id}"
            ))
        })?;
        if Self::settle_config(record) {
            rule_groups.remove(&key);
            return Err(MetricsError::NotFound(format!(
                "rule groups namespace {name} not found in workspace {workspace_id}"
            )));
        }
        let record = &rule_groups[&key];
        Ok(RuleGroupsNamespaceDescription {
            name: name.to_string(),
            arn: record.arn.clone(),
            status: record.status.clone(),
            data: record.accepted.clone(),
            tags: record.tags.clone(),
            modified_at: Some(chrono::Utc::now()),
        })
    }

    async fn put_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        data: &str,
    ) -> Result<PutRuleGroupsNamespaceResponse, MetricsError> {
        let key = (workspace_id.to_string(), name.to_string());
        let mut rule_groups = self.rule_groups.lock().unwrap();
        let record = rule_groups.get_mut(&key).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "rule groups namespace {name} not found in workspace {workspace_id}"
            ))
        })?;
        if record.status.status_code.is_transient() {
            return Err(MetricsError::Conflict(format!(
                "rule groups namespace {name} is {}, cannot be modified",
                record.status.status_code.as_wire_str()
            )));
        }
        record.pending = Some(data.to_string());
        record.status = ResourceStatus::new(StatusCode::Updating);
        record.polls_remaining = self.settle_polls;
        Ok(PutRuleGroupsNamespaceResponse {
            name: name.to_string(),
            arn: record.arn.clone(),
            status: record.status.clone(),
        })
    }

    async fn delete_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> Result<(), MetricsError> {
        let key = (workspace_id.to_string(), name.to_string());
        let mut rule_groups = self.rule_groups.lock().unwrap();
        let record = rule_groups.get_mut(&key).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "rule groups namespace {name} not found in workspace {workspace_id}"
            ))
        })?;
        record.status = ResourceStatus::new(StatusCode::Deleting);
        record.polls_remaining = self.settle_polls;
        Ok(())
    }

    async fn create_alert_manager_definition(
        &self,
        workspace_id: &str,
        data: &str,
    ) -> Result<CreateAlertManagerDefinitionResponse, MetricsError> {
        if !self.workspace_exists(workspace_id) {
            return Err(MetricsError::NotFound(format!(
                "workspace {workspace_id} not found"
            )));
        }
        let mut alert_managers = self.alert_managers.lock().unwrap();
        if alert_managers.contains_key(workspace_id) {
            return Err(MetricsError::Conflict(format!(
                "alert manager definition already exists for workspace {workspace_id}"
            )));
        }
        let status = ResourceStatus::new(StatusCode::Creating);
        alert_managers.insert(
            workspace_id.to_string(),
            ConfigRecord {
                arn: format!("arn:metrics::alertmanager/{workspace_id}"),
                status: status.clone(),
                accepted: None,
                pending: Some(data.to_string()),
                tags: BTreeMap::new(),
                polls_remaining: self.settle_polls,
            },
        );
        Ok(CreateAlertManagerDefinitionResponse { status })
    }

    async fn describe_alert_manager_definition(
        &self,
        workspace_id: &str,
    ) -> Result<AlertManagerDefinitionDescription, MetricsError> {
        let mut alert_managers = self.alert_managers.lock().unwrap();
        let record = alert_managers.get_mut(workspace_id).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "no alert manager definition for workspace {workspace_id}"
            ))
        })?;
        if Self::settle_config(record) {
            alert_managers.remove(workspace_id);
            return Err(MetricsError::NotFound(format!(
                "no alert manager definition for workspace {workspace_id}"
            )));
        }
        let record = &alert_managers[workspace_id];
        Ok(AlertManagerDefinitionDescription {
            status: record.status.clone(),
            data: record.accepted.clone(),
            modified_at: Some(chrono::Utc::now()),
        })
    }

    async fn put_alert_manager_definition(
        &self,
        workspace_id: &str,
        data: &str,
    ) -> Result<PutAlertManagerDefinitionResponse, MetricsError> {
        let mut alert_managers = self.alert_managers.lock().unwrap();
        let record = alert_managers.get_mut(workspace_id).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "no alert manager definition for workspace {workspace_id}"
            ))
        })?;
        if record.status.status_code.is_transient() {
            return Err(MetricsError::Conflict(format!(
                "alert manager definition is {}, cannot be modified",
                record.status.status_code.as_wire_str()
            )));
        }
        record.pending = Some(data.to_string());
        record.status = ResourceStatus::new(StatusCode::Updating);
        record.polls_remaining = self.settle_polls;
        Ok(PutAlertManagerDefinitionResponse {
            status: record.status.clone(),
        })
    }

    async fn delete_alert_manager_definition(&self, workspace_id: &str) -> Result<(), MetricsError> {
        let mut alert_managers = self.alert_managers.lock().unwrap();
        let record = alert_managers.get_mut(workspace_id).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "no alert manager definition for workspace {workspace_id}"
            ))
        })?;
        record.status = ResourceStatus::new(StatusCode::Deleting);
        record.polls_remaining = self.settle_polls;
        Ok(())
    }

    async fn create_logging_configuration(
        &self,
        workspace_id: &str,
        log_group_arn: &str,
    ) -> Result<CreateLoggingConfigurationResponse, MetricsError> {
        if !self.workspace_exists(workspace_id) {
            return Err(MetricsError::NotFound(format!(
                "workspace {workspace_id} not found"
            )));
        }
        if log_group_arn.is_empty() {
            return Err(MetricsError::Validation("logGroupArn must not be empty".to_string()));
        }
        let mut logging = self.logging.lock().unwrap();
        if logging.contains_key(workspace_id) {
            return Err(MetricsError::Conflict(format!(
                "logging configuration already exists for workspace {workspace_id}"
            )));
        }
        let status = ResourceStatus::new(StatusCode::Creating);
        logging.insert(
            workspace_id.to_string(),
            LoggingRecord {
                status: status.clone(),
                log_group_arn: log_group_arn.to_string(),
                polls_remaining: self.settle_polls,
            },
        );
        Ok(CreateLoggingConfigurationResponse { status })
    }

    async fn describe_logging_configuration(
        &self,
        workspace_id: &str,
    ) -> Result<LoggingConfigurationMetadata, MetricsError> {
        let mut logging = self.logging.lock().unwrap();
        let deletion_settled = {
            let record = logging.get_mut(workspace_id).ok_or_else(|| {
                MetricsError::NotFound(format!(
                    "no logging configuration for workspace {workspace_id}"
                ))
            })?;
            if !record.status.status_code.is_transient() {
                false
            } else if record.polls_remaining > 0 {
                record.polls_remaining -= 1;
                false
            } else if record.status.status_code == StatusCode::Deleting {
                true
            } else {
                record.status = ResourceStatus::new(StatusCode::Active);
                false
            }
        };
        if deletion_settled {
            logging.remove(workspace_id);
            return Err(MetricsError::NotFound(format!(
                "no logging configuration for workspace {workspace_id}"
            )));
        }
        let record = &logging[workspace_id];
        Ok(LoggingConfigurationMetadata {
            status: record.status.clone(),
            log_group_arn: record.log_group_arn.clone(),
            workspace: workspace_id.to_string(),
            modified_at: Some(chrono::Utc::now()),
        })
    }

    async fn update_logging_configuration(
        &self,
        workspace_id: &str,
        log_group_arn: &str,
    ) -> Result<UpdateLoggingConfigurationResponse, MetricsError> {
        if log_group_arn.is_empty() {
            return Err(MetricsError::Validation("logGroupArn must not be empty".to_string()));
        }
        let mut logging = self.logging.lock().unwrap();
        let record = logging.get_mut(workspace_id).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "no logging configuration for workspace {workspace_id}"
            ))
        })?;
        if record.status.status_code == StatusCode::Deleting {
            return Err(MetricsError::Conflict(
                "logging configuration is DELETING, cannot be modified".to_string(),
            ));
        }
        // Log group rerouting applies in place, no settling period
        record.log_group_arn = log_group_arn.to_string();
        record.status = ResourceStatus::new(StatusCode::Active);
        Ok(UpdateLoggingConfigurationResponse {
            status: record.status.clone(),
        })
    }

    async fn delete_logging_configuration(&self, workspace_id: &str) -> Result<(), MetricsError> {
        let mut logging = self.logging.lock().unwrap();
        let record = logging.get_mut(workspace_id).ok_or_else(|| {
            MetricsError::NotFound(format!(
                "no logging configuration for workspace {workspace_id}"
            ))
        })?;
        record.status = ResourceStatus::new(StatusCode::Deleting);
        record.polls_remaining = self.settle_polls;
        Ok(())
    }

    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> Result<(), MetricsError> {
        {
            let mut workspaces = self.workspaces.lock().unwrap();
            if let Some(record) = workspaces.values_mut().find(|r| r.description.arn == arn) {
                record.description.tags.extend(tags.clone());
                return Ok(());
            }
        }
        let mut rule_groups = self.rule_groups.lock().unwrap();
        if let Some(record) = rule_groups.values_mut().find(|r| r.arn == arn) {
            record.tags.extend(tags.clone());
            return Ok(());
        }
        Err(MetricsError::NotFound(format!("resource {arn} not found")))
    }

    async fn untag_resource(&self, arn: &str, tag_keys: &[String]) -> Result<(), MetricsError> {
        {
            let mut workspaces = self.workspaces.lock().unwrap();
            if let Some(record) = workspaces.values_mut().find(|r| r.description.arn == arn) {
                for key in tag_keys {
                    record.description.tags.remove(key);
                }
                return Ok(());
            }
        }
        let mut rule_groups = self.rule_groups.lock().unwrap();
        if let Some(record) = rule_groups.values_mut().find(|r| r.arn == arn) {
            for key in tag_keys {
                record.tags.remove(key);
            }
            return Ok(());
        }
        Err(MetricsError::NotFound(format!("resource {arn} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_RULES: &str = "groups:\n  - name: example\n    rules:\n      - record: up:sum\n        expr: sum(up)\n";
    const INVALID_RULES: &str = "groups: [unclosed\n";

    async fn active_workspace(client: &MockMetricsClient) -> String {
        let created = client
            .create_workspace(Some("test"), &BTreeMap::new())
            .await
            .unwrap();
        // First describe still reports CREATING, second settles to ACTIVE
        let _ = client.describe_workspace(&created.workspace_id).await.unwrap();
        let ws = client.describe_workspace(&created.workspace_id).await.unwrap();
        assert_eq!(ws.status.status_code, StatusCode::Active);
        created.workspace_id
    }

    #[tokio::test]
    async fn test_workspace_settles_to_active() {
        let client = MockMetricsClient::new("http://mock");
        let created = client
            .create_workspace(Some("team-a"), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(created.status.status_code, StatusCode::Creating);

        let first = client.describe_workspace(&created.workspace_id).await.unwrap();
        assert_eq!(first.status.status_code, StatusCode::Creating);

        let second = client.describe_workspace(&created.workspace_id).await.unwrap();
        assert_eq!(second.status.status_code, StatusCode::Active);

        // Reads after ACTIVE are idempotent
        let third = client.describe_workspace(&created.workspace_id).await.unwrap();
        assert_eq!(third.status.status_code, StatusCode::Active);
        assert_eq!(third.alias.as_deref(), Some("team-a"));
    }

    #[tokio::test]
    async fn test_workspace_delete_ends_in_not_found() {
        let client = MockMetricsClient::new("http://mock");
        let workspace_id = active_workspace(&client).await;

        client.delete_workspace(&workspace_id).await.unwrap();
        let deleting = client.describe_workspace(&workspace_id).await.unwrap();
        assert_eq!(deleting.status.status_code, StatusCode::Deleting);

        let gone = client.describe_workspace(&workspace_id).await;
        assert!(matches!(gone, Err(MetricsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rule_groups_configuration_round_trip() {
        let client = MockMetricsClient::new("http://mock");
        let workspace_id = active_workspace(&client).await;

        client
            .create_rule_groups_namespace(&workspace_id, "recording", VALID_RULES, &BTreeMap::new())
            .await
            .unwrap();

        let creating = client
            .describe_rule_groups_namespace(&workspace_id, "recording")
            .await
            .unwrap();
        assert_eq!(creating.status.status_code, StatusCode::Creating);
        assert!(creating.data.is_none());

        let active = client
            .describe_rule_groups_namespace(&workspace_id, "recording")
            .await
            .unwrap();
        assert_eq!(active.status.status_code, StatusCode::Active);
        // The accepted blob reads back byte-for-byte
        assert_eq!(active.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_rule_groups_name_collision_conflicts() {
        let client = MockMetricsClient::new("http://mock");
        let workspace_id = active_workspace(&client).await;

        client
            .create_rule_groups_namespace(&workspace_id, "shared-name", VALID_RULES, &BTreeMap::new())
            .await
            .unwrap();
        let second = client
            .create_rule_groups_namespace(&workspace_id, "shared-name", VALID_RULES, &BTreeMap::new())
            .await;
        assert!(matches!(second, Err(MetricsError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_invalid_configuration_settles_to_creation_failed() {
        let client = MockMetricsClient::new("http://mock");
        let workspace_id = active_workspace(&client).await;

        client
            .create_rule_groups_namespace(&workspace_id, "broken", INVALID_RULES, &BTreeMap::new())
            .await
            .unwrap();
        let _ = client
            .describe_rule_groups_namespace(&workspace_id, "broken")
            .await
            .unwrap();
        let failed = client
            .describe_rule_groups_namespace(&workspace_id, "broken")
            .await
            .unwrap();
        assert_eq!(failed.status.status_code, StatusCode::CreationFailed);
        assert!(failed.data.is_none());

        // Putting a valid configuration heals the namespace
        let put = client
            .put_rule_groups_namespace(&workspace_id, "broken", VALID_RULES)
            .await
            .unwrap();
        assert_eq!(put.status.status_code, StatusCode::Updating);

        let _ = client
            .describe_rule_groups_namespace(&workspace_id, "broken")
            .await
            .unwrap();
        let healed = client
            .describe_rule_groups_namespace(&workspace_id, "broken")
            .await
            .unwrap();
        assert_eq!(healed.status.status_code, StatusCode::Active);
        assert_eq!(healed.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_accepted_data() {
        let client = MockMetricsClient::new("http://mock");
        let workspace_id = active_workspace(&client).await;

        client
            .create_rule_groups_namespace(&workspace_id, "rules", VALID_RULES, &BTreeMap::new())
            .await
            .unwrap();
        let _ = client.describe_rule_groups_namespace(&workspace_id, "rules").await;
        let _ = client.describe_rule_groups_namespace(&workspace_id, "rules").await;

        client
            .put_rule_groups_namespace(&workspace_id, "rules", INVALID_RULES)
            .await
            .unwrap();
        let _ = client.describe_rule_groups_namespace(&workspace_id, "rules").await;
        let failed = client
            .describe_rule_groups_namespace(&workspace_id, "rules")
            .await
            .unwrap();
        assert_eq!(failed.status.status_code, StatusCode::UpdateFailed);
        // Spec and accepted data diverge: the old blob is still what serves
        assert_eq!(failed.data.as_deref(), Some(VALID_RULES));
    }

    #[tokio::test]
    async fn test_alert_manager_definition_is_singleton() {
        let client = MockMetricsClient::new("http://mock");
        let workspace_id = active_workspace(&client).await;

        client
            .create_alert_manager_definition(&workspace_id, "route:\n  receiver: default\n")
            .await
            .unwrap();
        let duplicate = client
            .create_alert_manager_definition(&workspace_id, "route:\n  receiver: default\n")
            .await;
        assert!(matches!(duplicate, Err(MetricsError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_logging_configuration_update_is_synchronous() {
        let client = MockMetricsClient::new("http://mock");
        let workspace_id = active_workspace(&client).await;

        client
            .create_logging_configuration(&workspace_id, "arn:logs::group/one")
            .await
            .unwrap();
        let _ = client.describe_logging_configuration(&workspace_id).await;
        let active = client.describe_logging_configuration(&workspace_id).await.unwrap();
        assert_eq!(active.status.status_code, StatusCode::Active);
        assert_eq!(active.log_group_arn, "arn:logs::group/one");

        let updated = client
            .update_logging_configuration(&workspace_id, "arn:logs::group/two")
            .await
            .unwrap();
        assert_eq!(updated.status.status_code, StatusCode::Active);
        let read_back = client.describe_logging_configuration(&workspace_id).await.unwrap();
        assert_eq!(read_back.log_group_arn, "arn:logs::group/two");
    }

    #[tokio::test]
    async fn test_tagging_merges_and_removes() {
        let client = MockMetricsClient::new("http://mock");
        let mut tags = BTreeMap::new();
        tags.insert("k1".to_string(), "v1".to_string());
        tags.insert("k2".to_string(), "v2".to_string());
        let created = client.create_workspace(None, &tags).await.unwrap();

        let mut update = BTreeMap::new();
        update.insert("k1".to_string(), "v1_updated".to_string());
        update.insert("k3".to_string(), "v3".to_string());
        client.tag_resource(&created.arn, &update).await.unwrap();
        client
            .untag_resource(&created.arn, &["k2".to_string()])
            .await
            .unwrap();

        let _ = client.describe_workspace(&created.workspace_id).await;
        let ws = client.describe_workspace(&created.workspace_id).await.unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("k1".to_string(), "v1_updated".to_string());
        expected.insert("k3".to_string(), "v3".to_string());
        assert_eq!(ws.tags, expected);
    }
}
