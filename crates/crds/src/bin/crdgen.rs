//! Renders the CRD manifests to stdout as a multi-document YAML stream.
//!
//! Usage: `cargo run --bin crdgen > deploy/crds.yaml`

use crds::{AlertManagerDefinition, LoggingConfiguration, RuleGroupsNamespace, Workspace};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        serde_yaml::to_string(&Workspace::crd())?,
        serde_yaml::to_string(&RuleGroupsNamespace::crd())?,
        serde_yaml::to_string(&AlertManagerDefinition::crd())?,
        serde_yaml::to_string(&LoggingConfiguration::crd())?,
    ];
    println!("{}", crds.join("---\n"));
    Ok(())
}
