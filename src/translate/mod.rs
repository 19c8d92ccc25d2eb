//! Translation between resource models and API bodies.
//!
//! `flatten_*` functions map API objects to models, `expand_*` functions map
//! models to request bodies. [`ChangeSet`] records which attribute paths
//! differ between prior state and plan so that updates can send partial
//! payloads.

pub mod cluster;
pub mod labels;
pub mod node_deployment;

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::schema::is_unset;

pub use cluster::{ClusterPreserved, cluster_patch, expand_cluster, flatten_cluster};
pub use labels::{is_node_system_label, is_system_label, label_changes, node_user_labels, user_labels};
pub use node_deployment::{expand_node_deployment, flatten_node_deployment, label_removal_patch};

/// Returns `Some(s)` unless `s` is empty.
#[must_use]
pub fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Returns the first non-empty candidate.
#[must_use]
pub fn first_non_empty(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|s| !s.is_empty())
        .map(|s| (*s).to_string())
}

/// Attribute paths that differ between two models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    everything: bool,
    paths: BTreeSet<String>,
}

impl ChangeSet {
    /// A change set that includes every path, used for creates.
    #[must_use]
    pub fn everything() -> Self {
        Self {
            everything: true,
            paths: BTreeSet::new(),
        }
    }

    /// Computes the leaf paths that differ between `prior` and `plan`.
    ///
    /// Absent, `null` and empty values are equivalent.
    ///
    /// # Errors
    ///
    /// Returns an error if either model fails to serialize.
    pub fn between<T: Serialize>(prior: &T, plan: &T) -> Result<Self> {
        let prior = serde_json::to_value(prior)?;
        let plan = serde_json::to_value(plan)?;
        let mut paths = BTreeSet::new();
        diff_values("", Some(&prior), Some(&plan), &mut paths);
        Ok(Self {
            everything: false,
            paths,
        })
    }

    /// Returns true when `path` or anything below it changed.
    #[must_use]
    pub fn includes(&self, path: &str) -> bool {
        self.everything
            || self.paths.iter().any(|changed| {
                changed == path
                    || changed
                        .strip_prefix(path)
                        .is_some_and(|rest| rest.starts_with('.'))
            })
    }

    /// Returns true when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.everything && self.paths.is_empty()
    }

    /// Iterates over the changed leaf paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn diff_values(path: &str, prior: Option<&Value>, plan: Option<&Value>, out: &mut BTreeSet<String>) {
    match (prior, plan) {
        (Some(Value::Object(before)), Some(Value::Object(after))) => {
            let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
            for key in keys {
                diff_values(&join(path, key), before.get(key), after.get(key), out);
            }
        }
        (Some(Value::Object(before)), after) if is_unset(after) => {
            for (key, value) in before {
                diff_values(&join(path, key), Some(value), None, out);
            }
        }
        (before, Some(Value::Object(after))) if is_unset(before) => {
            for (key, value) in after {
                diff_values(&join(path, key), None, Some(value), out);
            }
        }
        (before, after) => {
            let unchanged = (is_unset(before) && is_unset(after)) || before == after;
            if !unchanged {
                out.insert(path.to_string());
            }
        }
    }
}
