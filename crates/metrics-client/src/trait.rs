//! MetricsClient trait for mocking
//!
//! This trait abstracts the metrics control-plane client so reconcilers can be
//! unit tested against an in-memory mock. The concrete `MetricsClient`
//! implements it over HTTP.

use crate::error::MetricsError;
use crate::models::*;
use std::collections::BTreeMap;

/// Trait for metrics control-plane API operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing
/// runtime. Error classification (retryable vs terminal) is part of this
/// contract: implementations map their failure modes onto [`MetricsError`]
/// variants rather than leaving callers to interpret messages.
#[async_trait::async_trait]
pub trait MetricsClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Validate connectivity and credentials with a lightweight call
    async fn validate_connectivity(&self) -> Result<(), MetricsError>;

    // Workspace operations
    async fn create_workspace(
        &self,
        alias: Option<&str>,
        tags: &BTreeMap<String, String>,
    ) -> Result<CreateWorkspaceResponse, MetricsError>;
    async fn describe_workspace(&self, workspace_id: &str) -> Result<WorkspaceDescription, MetricsError>;
    /// List workspaces, optionally filtered by alias. This is the existence
    /// check used to re-observe after a create call with unknown outcome.
    async fn list_workspaces(&self, alias: Option<&str>) -> Result<Vec<WorkspaceSummary>, MetricsError>;
    async fn update_workspace_alias(
        &self,
        workspace_id: &str,
        alias: Option<&str>,
    ) -> Result<(), MetricsError>;
    async fn delete_workspace(&self, workspace_id: &str) -> Result<(), MetricsError>;

    // Rule groups namespace operations
    async fn create_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        data: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<CreateRuleGroupsNamespaceResponse, MetricsError>;
    async fn describe_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> Result<RuleGroupsNamespaceDescription, MetricsError>;
    /// Upsert the configuration of a rule groups namespace. Also the path
    /// that heals a namespace out of a failed status.
    async fn put_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        data: &str,
    ) -> Result<PutRuleGroupsNamespaceResponse, MetricsError>;
    async fn delete_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> Result<(), MetricsError>;

    // Alert manager definition operations (at most one per workspace)
    async fn create_alert_manager_definition(
        &self,
        workspace_id: &str,
        data: &str,
    ) -> Result<CreateAlertManagerDefinitionResponse, MetricsError>;
    async fn describe_alert_manager_definition(
        &self,
        workspace_id: &str,
    ) -> Result<AlertManagerDefinitionDescription, MetricsError>;
    async fn put_alert_manager_definition(
        &self,
        workspace_id: &str,
        data: &str,
    ) -> Result<PutAlertManagerDefinitionResponse, MetricsError>;
    async fn delete_alert_manager_definition(&self, workspace_id: &str) -> Result<(), MetricsError>;

    // Logging configuration operations (at most one per workspace)
    async fn create_logging_configuration(
        &self,
        workspace_id: &str,
        log_group_arn: &str,
    ) -> Result<CreateLoggingConfigurationResponse, MetricsError>;
    async fn describe_logging_configuration(
        &self,
        workspace_id: &str,
    ) -> Result<LoggingConfigurationMetadata, MetricsError>;
    async fn update_logging_configuration(
        &self,
        workspace_id: &str,
        log_group_arn: &str,
    ) -> Result<UpdateLoggingConfigurationResponse, MetricsError>;
    async fn delete_logging_configuration(&self, workspace_id: &str) -> Result<(), MetricsError>;

    // Tagging operations (workspaces and rule groups namespaces)
    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> Result<(), MetricsError>;
    async fn untag_resource(&self, arn: &str, tag_keys: &[String]) -> Result<(), MetricsError>;
}
