//! Import identifier parsing.

use crate::error::{ImportError, Result};

/// Expected cluster import formats.
pub const CLUSTER_FORMAT: &str = "<project_id>:<cluster_id> or <cluster_id>";
/// Expected node deployment import format.
pub const NODE_DEPLOYMENT_FORMAT: &str = "<project_id>:<cluster_id>:<node_deployment_id>";
/// Expected SSH key import formats.
pub const SSHKEY_FORMAT: &str = "<project_id>:<sshkey_id> or <sshkey_id>";
/// Expected role binding import format.
pub const ROLE_BINDING_FORMAT: &str = "<project_id>:<cluster_id>:<namespace>:<role_name>";
/// Expected cluster role binding import format.
pub const CLUSTER_ROLE_BINDING_FORMAT: &str = "<project_id>:<cluster_id>:<cluster_role_name>";

/// Splits `id` into exactly `N` non-empty segments.
fn split<const N: usize>(id: &str, expected: &'static str) -> Result<[String; N]> {
    let parts: Vec<&str> = id.split(':').collect();
    if parts.len() != N || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid(id, expected));
    }

    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.trim().to_string();
    }
    Ok(out)
}

fn invalid(id: &str, expected: &'static str) -> crate::error::MetaKubeError {
    ImportError::InvalidFormat {
        id: id.to_string(),
        expected,
    }
    .into()
}

/// Parses a two-part id that may omit its project.
fn optional_project(id: &str, expected: &'static str) -> Result<(Option<String>, String)> {
    if id.contains(':') {
        let [project, object] = split::<2>(id, expected)?;
        Ok((Some(project), object))
    } else if id.trim().is_empty() {
        Err(invalid(id, expected))
    } else {
        Ok((None, id.trim().to_string()))
    }
}

/// `project_id:cluster_id` or `cluster_id`.
///
/// # Errors
///
/// Returns [`ImportError::InvalidFormat`] naming the expected format.
pub fn parse_cluster_id(id: &str) -> Result<(Option<String>, String)> {
    optional_project(id, CLUSTER_FORMAT)
}

/// `project_id:cluster_id:node_deployment_id`.
///
/// # Errors
///
/// Returns [`ImportError::InvalidFormat`] naming the expected format.
pub fn parse_node_deployment_id(id: &str) -> Result<[String; 3]> {
    split::<3>(id, NODE_DEPLOYMENT_FORMAT)
}

/// `project_id:sshkey_id` or `sshkey_id`.
///
/// # Errors
///
/// Returns [`ImportError::InvalidFormat`] naming the expected format.
pub fn parse_sshkey_id(id: &str) -> Result<(Option<String>, String)> {
    optional_project(id, SSHKEY_FORMAT)
}

/// `project_id:cluster_id:namespace:role_name`.
///
/// # Errors
///
/// Returns [`ImportError::InvalidFormat`] naming the expected format.
pub fn parse_role_binding_id(id: &str) -> Result<[String; 4]> {
    split::<4>(id, ROLE_BINDING_FORMAT)
}

/// `project_id:cluster_id:cluster_role_name`.
///
/// # Errors
///
/// Returns [`ImportError::InvalidFormat`] naming the expected format.
pub fn parse_cluster_role_binding_id(id: &str) -> Result<[String; 3]> {
    split::<3>(id, CLUSTER_ROLE_BINDING_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_id_forms() {
        assert_eq!(
            parse_cluster_id("abc123").expect("bare id"),
            (None, String::from("abc123"))
        );
        assert_eq!(
            parse_cluster_id("proj-42:abc123").expect("qualified id"),
            (Some(String::from("proj-42")), String::from("abc123"))
        );
        assert!(parse_cluster_id("a:b:c").is_err());
        assert!(parse_cluster_id(":abc").is_err());
    }

    #[test]
    fn test_malformed_node_deployment_id_names_format() {
        let err = parse_node_deployment_id("123abc").expect_err("should fail");
        let message = err.to_string();

        assert!(message.contains("123abc"));
        assert!(message.contains(NODE_DEPLOYMENT_FORMAT));
    }

    #[test]
    fn test_role_binding_id() {
        let [project, cluster, namespace, role] =
            parse_role_binding_id("p:c:kube-system:view").expect("valid id");
        assert_eq!(project, "p");
        assert_eq!(cluster, "c");
        assert_eq!(namespace, "kube-system");
        assert_eq!(role, "view");

        assert!(parse_role_binding_id("p:c:view").is_err());
    }

    #[test]
    fn test_cluster_role_binding_id() {
        assert!(parse_cluster_role_binding_id("p:c:cluster-admin").is_ok());
        assert!(parse_cluster_role_binding_id("p::cluster-admin").is_err());
    }
}
