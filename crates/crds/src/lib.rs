//! Managed Metrics Service CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the metrics controller:
//! - Workspace: a remote metrics workspace
//! - RuleGroupsNamespace: a named rule groups configuration inside a workspace
//! - AlertManagerDefinition: the alert manager configuration for a workspace (singleton)
//! - LoggingConfiguration: the logging configuration for a workspace (singleton)

pub mod alert_manager_definition;
pub mod conditions;
pub mod logging_configuration;
pub mod rule_groups_namespace;
pub mod status;
pub mod workspace;

pub use alert_manager_definition::*;
pub use conditions::*;
pub use logging_configuration::*;
pub use rule_groups_namespace::*;
pub use status::*;
pub use workspace::*;
