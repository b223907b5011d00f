//! AlertManagerDefinition CRD
//!
//! The alert manager configuration for a workspace. At most one definition
//! exists per workspace; the remote service rejects a second creation with a
//! conflict, which the controller reports as terminal.

use crate::conditions::ResourceCondition;
use crate::status::StatusCode;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "metrics.microscaler.io",
    version = "v1alpha1",
    kind = "AlertManagerDefinition",
    namespaced,
    status = "AlertManagerDefinitionStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct AlertManagerDefinitionSpec {
    /// Parent workspace ID
    #[serde(rename = "workspaceID")]
    pub workspace_id: String,

    /// Alert manager configuration blob (YAML)
    pub configuration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertManagerDefinitionStatus {
    /// Last observed remote status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,

    /// Reason attached to the remote status, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,

    /// Last configuration blob durably accepted by the remote service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

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
