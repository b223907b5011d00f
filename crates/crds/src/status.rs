//! Remote status codes shared by all managed metrics resources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Status code reported by the remote metrics service for a managed resource.
///
/// Serializes using the service's wire format ("CREATING", "CREATION_FAILED", etc.).
/// CREATING, UPDATING and DELETING are transient and resolve on the service's own
/// schedule; ACTIVE, CREATION_FAILED and UPDATE_FAILED are stable until the next
/// user-driven change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Resource creation has been accepted and is in progress
    Creating,

    /// Resource is live and serving its configuration
    Active,

    /// An asynchronous update is in progress
    Updating,

    /// Resource deletion has been accepted and is in progress
    Deleting,

    /// The most recent creation attempt settled into failure
    CreationFailed,

    /// The most recent update attempt settled into failure
    UpdateFailed,
}

impl StatusCode {
    /// True while the remote service is still working on the resource.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Creating | Self::Updating | Self::Deleting)
    }

    /// True for the stable failure statuses. These are not transient: the
    /// resource stays in them until the user submits a new configuration.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::CreationFailed | Self::UpdateFailed)
    }

    /// Wire representation of the status code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
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

/// Error returned when parsing an unknown status code string.
#[derive(Debug, Error)]
#[error("unknown status code: {0}")]
pub struct ParseStatusCodeError(String);

impl FromStr for StatusCode {
    type Err = ParseStatusCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATING" => Ok(Self::Creating),
            "ACTIVE" => Ok(Self::Active),
            "UPDATING" => Ok(Self::Updating),
            "DELETING" => Ok(Self::Deleting),
            "CREATION_FAILED" => Ok(Self::CreationFailed),
            "UPDATE_FAILED" => Ok(Self::UpdateFailed),
            other => Err(ParseStatusCodeError(other.to_string())),
        }
    }
}
