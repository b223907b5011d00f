//! Data models for the metrics control-plane API
//!
//! Configuration payloads (`data`) are held decoded; the HTTP client handles
//! the base64 framing the wire format uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remote status code for a managed resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Creating,
    Active,
    Updating,
    Deleting,
    CreationFailed,
    UpdateFailed,
}

impl StatusCode {
    /// True while the service is still working on the resource
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Creating | Self::Updating | Self::Deleting)
    }

    /// Wire representation of the status code
    #[must_use]
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
            Self::CreationFailed => "CREATION_FAILED",
            Self::UpdateFailed => "UPDATE_FAILED",
        }
    }
}

/// Status block attached to every resource response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub status_code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
}

impl ResourceStatus {
    /// Convenience constructor for a status without a reason
    #[must_use]
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            status_reason: None,
        }
    }
}

/// Full read-back of a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDescription {
    pub workspace_id: String,
    pub arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub status: ResourceStatus,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Summary entry returned by the workspace listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub workspace_id: String,
    pub arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub status: ResourceStatus,
}

/// Response to a workspace creation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceResponse {
    pub workspace_id: String,
    pub arn: String,
    pub status: ResourceStatus,
}

/// Full read-back of a rule groups namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupsNamespaceDescription {
    pub name: String,
    pub arn: String,
    pub status: ResourceStatus,
    /// Last configuration the service durably accepted. Absent when creation
    /// failed before any configuration was accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Response to a rule groups namespace creation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleGroupsNamespaceResponse {
    pub name: String,
    pub arn: String,
    pub status: ResourceStatus,
}

/// Response to a rule groups namespace put (upsert) call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutRuleGroupsNamespaceResponse {
    pub name: String,
    pub arn: String,
    pub status: ResourceStatus,
}

/// Full read-back of an alert manager definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertManagerDefinitionDescription {
    pub status: ResourceStatus,
    /// Last configuration the service durably accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Response to an alert manager definition creation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertManagerDefinitionResponse {
    pub status: ResourceStatus,
}

/// Response to an alert manager definition put call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutAlertManagerDefinitionResponse {
    pub status: ResourceStatus,
}

/// Full read-back of a workspace's logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfigurationMetadata {
    pub status: ResourceStatus,
    pub log_group_arn: String,
    /// Workspace the configuration belongs to
    pub workspace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Response to a logging configuration creation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoggingConfigurationResponse {
    pub status: ResourceStatus,
}

/// Response to a logging configuration update call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoggingConfigurationResponse {
    pub status: ResourceStatus,
}
