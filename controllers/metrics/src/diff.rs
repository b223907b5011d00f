//! Differencer: computes the remote calls needed to move observed state
//! toward the desired spec.
//!
//! Diffs always run against the latest observed remote state, never against
//! the desired spec of a previous pass, so changes made outside the
//! controller are corrected rather than missed.

use std::collections::BTreeMap;

/// The tag calls required to reconcile a resource's tags.
///
/// Tags merge key-by-key on the remote side: `upserts` go to the tagging
/// call, `removals` to the untagging call, and keys in neither set are left
/// untouched. This is never a full replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Keys to add or overwrite, with their desired values
    pub upserts: BTreeMap<String, String>,
    /// Keys present remotely but absent from the desired spec
    pub removals: Vec<String>,
}

impl TagDiff {
    /// True when observed and desired tags already match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Compares observed tags against desired tags.
///
/// Returns the keys that were added or changed and the keys that were
/// removed. Keys with unchanged values appear in neither set.
#[must_use]
pub fn diff_tags(
    observed: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> TagDiff {
    let mut diff = TagDiff::default();

    for (key, observed_value) in observed {
        match desired.get(key) {
            None => diff.removals.push(key.clone()),
            Some(desired_value) if desired_value != observed_value => {
                diff.upserts.insert(key.clone(), desired_value.clone());
            }
            Some(_) => {}
        }
    }
    for (key, desired_value) in desired {
        if !observed.contains_key(key) {
            diff.upserts.insert(key.clone(), desired_value.clone());
        }
    }

    diff
}

/// Applies a merge patch to a tag map.
///
/// A key mapped to `Some(value)` is set, a key mapped to `None` is removed,
/// and keys absent from the patch are left untouched. This mirrors how the
/// apiserver merges partial updates to `spec.tags`.
#[must_use]
pub fn merge_tag_patch(
    current: &BTreeMap<String, String>,
    patch: &BTreeMap<String, Option<String>>,
) -> BTreeMap<String, String> {
    let mut merged = current.clone();
    for (key, value) in patch {
        match value {
            Some(value) => {
                merged.insert(key.clone(), value.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }
    merged
}

/// Whether a configuration blob needs to be pushed to the remote service.
///
/// Comparison is byte-exact between the desired blob and the last accepted
/// one. An absent accepted blob (nothing was ever accepted, e.g. after a
/// failed creation) always counts as divergent, so the next user-driven sync
/// attempts the write instead of assuming equality.
#[must_use]
pub fn configuration_differs(desired: &str, accepted: Option<&str>) -> bool {
    match accepted {
        None => true,
        Some(accepted) => desired != accepted,
    }
}
