//! Status conditions reported on every managed metrics resource.
//!
//! Two condition types are maintained per resource:
//! - `ResourceSynced`: True when the observed remote state matches the latest
//!   applied desired state and the resource sits in a stable status. False
//!   throughout CREATING, UPDATING and DELETING.
//! - `Terminal`: True only for non-retryable failures. A terminal resource is
//!   never retried by the controller; a spec change clears the condition.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type for "observed state matches desired state".
pub const CONDITION_SYNCED: &str = "ResourceSynced";

/// Condition type for non-retryable failures.
pub const CONDITION_TERMINAL: &str = "Terminal";

/// A single boolean-with-reason condition entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCondition {
    /// Condition type, e.g. "ResourceSynced" or "Terminal"
    #[serde(rename = "type")]
    pub condition_type: String,

    /// "True" or "False"
    pub status: String,

    /// Machine-readable reason for the last transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the condition last changed status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Sets a condition in place, preserving `lastTransitionTime` when the boolean
/// value did not change. Reason and message always reflect the latest pass.
pub fn set_condition(
    conditions: &mut Vec<ResourceCondition>,
    condition_type: &str,
    value: bool,
    reason: &str,
    message: impl Into<String>,
) {
    let status = if value { "True" } else { "False" };
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        Some(existing) => {
            if existing.status != status {
                existing.last_transition_time = Some(Utc::now());
            }
            existing.status = status.to_string();
            existing.reason = Some(reason.to_string());
            existing.message = Some(message.into());
        }
        None => {
            conditions.push(ResourceCondition {
                condition_type: condition_type.to_string(),
                status: status.to_string(),
                reason: Some(reason.to_string()),
                message: Some(message.into()),
                last_transition_time: Some(Utc::now()),
            });
        }
    }
}

/// Sets the `ResourceSynced` condition.
pub fn set_synced(
    conditions: &mut Vec<ResourceCondition>,
    value: bool,
    reason: &str,
    message: impl Into<String>,
) {
    set_condition(conditions, CONDITION_SYNCED, value, reason, message);
}

/// Sets the `Terminal` condition.
pub fn set_terminal(
    conditions: &mut Vec<ResourceCondition>,
    value: bool,
    reason: &str,
    message: impl Into<String>,
) {
    set_condition(conditions, CONDITION_TERMINAL, value, reason, message);
}

/// Looks up a condition by type.
#[must_use]
pub fn get_condition<'a>(
    conditions: &'a [ResourceCondition],
    condition_type: &str,
) -> Option<&'a ResourceCondition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

/// True when the `ResourceSynced` condition is present and "True".
#[must_use]
pub fn is_synced(conditions: &[ResourceCondition]) -> bool {
    get_condition(conditions, CONDITION_SYNCED).is_some_and(|c| c.status == "True")
}

/// True when the `Terminal` condition is present and "True".
#[must_use]
pub fn is_terminal(conditions: &[ResourceCondition]) -> bool {
    get_condition(conditions, CONDITION_TERMINAL).is_some_and(|c| c.status == "True")
}
