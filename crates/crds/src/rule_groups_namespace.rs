//! RuleGroupsNamespace CRD
//!
//! A named rule groups configuration stored inside a workspace. Names are
//! unique per workspace and enforced by the remote service; a collision with
//! an object the controller does not own is terminal.

use crate::conditions::ResourceCondition;
use crate::status::StatusCode;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "metrics.microscaler.io",
    version = "v1alpha1",
    kind = "RuleGroupsNamespace",
    namespaced,
    status = "RuleGroupsNamespaceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupsNamespaceSpec {
    /// Parent workspace ID
    #[serde(rename = "workspaceID")]
    pub workspace_id: String,

    /// Rule groups namespace name, unique within the workspace
    pub name: String,

    /// Rule groups configuration blob (YAML). The user's intent; the status
    /// `data` field carries what the service last accepted.
    pub configuration: String,

    /// Tags applied to the remote resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupsNamespaceStatus {
    /// Remote resource name, used for tagging calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    /// Last observed remote status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,

    /// Reason attached to the remote status, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,

    /// Last configuration blob durably accepted by the remote service.
    /// Diverges from `spec.configuration` while a failed update is
    /// outstanding, and is absent after a failed creation.
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
