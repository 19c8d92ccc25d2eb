//! Pre-mutation validation.
//!
//! Validators run before any API write and never mutate. Local checks only
//! look at the model; server-side checks consult the platform catalogue.
//! Both return attribute-scoped [`Diagnostics`].

pub mod cluster;
pub mod node_deployment;

use std::collections::BTreeMap;

use ipnet::IpNet;

use crate::diagnostics::Diagnostics;
use crate::schema::timeouts::{Timeouts, parse_duration};
use crate::translate::labels::{is_node_system_label, is_system_label};

pub use cluster::{ClusterValidator, validate_cluster_local};
pub use node_deployment::{NodeDeploymentValidator, validate_node_deployment_local};

/// Rejects cluster labels whose key is reserved for the platform.
pub fn check_labels(attribute: &str, labels: &BTreeMap<String, String>, out: &mut Diagnostics) {
    for key in labels.keys().filter(|key| is_system_label(key)) {
        out.error_at(
            format!("{attribute}.{key}"),
            "Reserved label key",
            format!(
                "Label \"{key}\" is managed by the platform; keys containing \"system-\", \"system/\", \"metakube\" or \"kubernetes.io\" cannot be set."
            ),
        );
    }
}

/// Rejects node deployment labels the platform sets on its own.
pub fn check_node_labels(attribute: &str, labels: &BTreeMap<String, String>, out: &mut Diagnostics) {
    for key in labels.keys().filter(|key| is_node_system_label(key)) {
        out.error_at(
            format!("{attribute}.{key}"),
            "Reserved label key",
            format!("Label \"{key}\" is managed by the platform and cannot be set."),
        );
    }
}

/// Parses a version, reporting an error when it is not valid semver.
pub fn check_semver(attribute: &str, version: &str, out: &mut Diagnostics) -> Option<semver::Version> {
    match parse_version(version) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            out.error_at(attribute, "Invalid version", format!("\"{version}\": {e}"));
            None
        }
    }
}

/// Parses a version, tolerating a leading `v`.
///
/// # Errors
///
/// Returns the semver parse error.
pub fn parse_version(version: &str) -> Result<semver::Version, semver::Error> {
    semver::Version::parse(version.trim().trim_start_matches('v'))
}

/// Compares two versions semantically, falling back to text equality.
#[must_use]
pub fn same_version(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}

/// Validates a CIDR list; more than one block produces a warning.
pub fn check_cidrs(attribute: &str, value: &str, out: &mut Diagnostics) {
    let blocks: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for block in &blocks {
        if let Err(e) = block.parse::<IpNet>() {
            out.error_at(attribute, "Invalid CIDR", format!("\"{block}\": {e}"));
        }
    }

    if blocks.len() > 1 {
        out.warn(
            format!("Multiple CIDR blocks in {attribute}"),
            format!("Only the first block ({}) is sent to the API.", blocks[0]),
        );
    }
}

/// Rejects values outside `allowed`.
pub fn check_one_of(attribute: &str, value: &str, allowed: &[&str], out: &mut Diagnostics) {
    if !allowed.contains(&value) {
        out.error_at(
            attribute,
            "Invalid value",
            format!("\"{value}\" is not one of: {}", allowed.join(", ")),
        );
    }
}

/// Validates the durations of a timeouts block.
pub fn check_timeouts(timeouts: Option<&Timeouts>, out: &mut Diagnostics) {
    let Some(timeouts) = timeouts else {
        return;
    };

    for (attribute, value) in [
        ("timeouts.create", &timeouts.create),
        ("timeouts.update", &timeouts.update),
        ("timeouts.delete", &timeouts.delete),
    ] {
        if let Some(Err(e)) = value.as_deref().map(parse_duration) {
            out.error_at(attribute, "Invalid duration", e);
        }
    }
}

/// Formats a list of alternatives for a diagnostic detail.
#[must_use]
pub fn available(label: &str, items: &[String]) -> String {
    if items.is_empty() {
        format!("No {label} available.")
    } else {
        format!("Available {label}: {}", items.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_cidrs_warns_on_multiple_blocks() {
        let mut out = Diagnostics::new();
        check_cidrs("spec.pods_cidr", "172.25.0.0/16, 10.0.0.0/8", &mut out);

        assert!(!out.has_errors());
        assert_eq!(out.warnings().count(), 1);
    }

    #[test]
    fn test_check_cidrs_rejects_garbage() {
        let mut out = Diagnostics::new();
        check_cidrs("spec.pods_cidr", "172.25.0.0/33", &mut out);
        assert!(out.has_errors());
    }

    #[test]
    fn test_parse_version_tolerates_prefix() {
        assert_eq!(
            parse_version("v1.28.5").expect("version"),
            semver::Version::new(1, 28, 5)
        );
        assert!(parse_version("1.28").is_err());
    }

    #[test]
    fn test_reserved_labels_are_rejected() {
        let mut labels = BTreeMap::new();
        labels.insert(String::from("metakube/owner"), String::from("x"));
        labels.insert(String::from("team"), String::from("y"));

        let mut out = Diagnostics::new();
        check_labels("labels", &labels, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(
            out.iter().next().and_then(|d| d.attribute.as_deref()),
            Some("labels.metakube/owner")
        );
    }

    #[test]
    fn test_bad_timeout_is_reported() {
        let timeouts = Timeouts {
            create: Some(String::from("forever")),
            ..Timeouts::default()
        };
        let mut out = Diagnostics::new();
        check_timeouts(Some(&timeouts), &mut out);
        assert!(out.has_errors());
    }
}
