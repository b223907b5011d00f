//! LoggingConfiguration CRD
//!
//! Routes a workspace's logs to a log group. At most one logging
//! configuration exists per workspace.

use crate::conditions::ResourceCondition;
use crate::status::StatusCode;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "metrics.microscaler.io",
    version = "v1alpha1",
    kind = "LoggingConfiguration",
    namespaced,
    status = "LoggingConfigurationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfigurationSpec {
    /// Parent workspace ID
    #[serde(rename = "workspaceID")]
    pub workspace_id: String,

    /// Destination log group for workspace logs
    #[serde(rename = "logGroupARN")]
    pub log_group_arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfigurationStatus {
    /// Last observed remote status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,

    /// Reason attached to the remote status, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,

    /// Log group the remote service last accepted
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "logGroupARN")]
    pub log_group_arn: Option<String>,

    /// Workspace the configuration is attached to, as read back from the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Generation of the spec this status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// ResourceSynced and Terminal conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ResourceCondition>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}
