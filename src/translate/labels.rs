//! Label filtering and label change payloads.

use std::collections::BTreeMap;

/// Substrings marking a cluster label key as managed by the platform.
const SYSTEM_MARKERS: &[&str] = &["system-", "system/", "metakube", "kubernetes.io"];

/// Node deployment label keys the platform manages.
const NODE_SYSTEM_KEYS: &[&str] = &["system/cluster", "system/project"];

/// Returns true for cluster label keys the platform manages.
#[must_use]
pub fn is_system_label(key: &str) -> bool {
    key == "labels.%" || SYSTEM_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Returns true for node deployment label keys the platform manages.
#[must_use]
pub fn is_node_system_label(key: &str) -> bool {
    NODE_SYSTEM_KEYS.contains(&key)
}

/// Returns the user-visible subset of cluster `labels`.
#[must_use]
pub fn user_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    visible_labels(labels, is_system_label)
}

/// Returns the user-visible subset of node deployment `labels`.
#[must_use]
pub fn node_user_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    visible_labels(labels, is_node_system_label)
}

fn visible_labels(
    labels: &BTreeMap<String, String>,
    reserved: fn(&str) -> bool,
) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter(|(key, _)| !reserved(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Returns the keys present in `prior` but not in `plan`, skipping keys
/// matched by `reserved`.
#[must_use]
pub fn removed_labels(
    prior: &BTreeMap<String, String>,
    plan: &BTreeMap<String, String>,
    reserved: fn(&str) -> bool,
) -> Vec<String> {
    prior
        .keys()
        .filter(|key| !plan.contains_key(*key) && !reserved(key))
        .cloned()
        .collect()
}

/// Builds a merge-patch label map: added or changed keys carry their new
/// value, removed keys carry `None`. Returns `None` when nothing changed.
#[must_use]
pub fn label_changes(
    prior: &BTreeMap<String, String>,
    plan: &BTreeMap<String, String>,
) -> Option<BTreeMap<String, Option<String>>> {
    let mut changes: BTreeMap<String, Option<String>> = plan
        .iter()
        .filter(|(key, value)| !is_system_label(key) && prior.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), Some(value.clone())))
        .collect();

    for key in removed_labels(prior, plan, is_system_label) {
        changes.insert(key, None);
    }

    (!changes.is_empty()).then_some(changes)
}
