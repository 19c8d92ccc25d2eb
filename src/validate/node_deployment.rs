//! Node deployment validation.

use crate::api::types::Cluster;
use crate::api::MetaKubeClient;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::schema::cluster::CloudProvider;
use crate::schema::node_deployment::{NodeDeploymentModel, TAINT_EFFECTS};

use super::{available, check_node_labels, check_one_of, check_semver, check_timeouts, parse_version, same_version};

/// Checks a node deployment model without contacting the API.
#[must_use]
pub fn validate_node_deployment_local(model: &NodeDeploymentModel) -> Diagnostics {
    let mut out = Diagnostics::new();
    let spec = &model.spec;
    let template = &spec.template;

    check_timeouts(model.timeouts.as_ref(), &mut out);
    check_node_labels("spec.template.labels", &template.labels, &mut out);

    if let Some(kubelet) = model.kubelet_version() {
        check_semver("spec.template.versions.kubelet", kubelet, &mut out);
    }

    if template.cloud.providers().len() != 1 {
        out.error_at(
            "spec.template.cloud",
            "Exactly one cloud provider block is required",
            "Set exactly one of aws, openstack or azure.",
        );
    }
    if template.operating_system.count() != 1 {
        out.error_at(
            "spec.template.operating_system",
            "Exactly one operating system block is required",
            "Set exactly one of ubuntu or flatcar.",
        );
    }

    for (index, taint) in template.taints.iter().enumerate() {
        check_one_of(
            &format!("spec.template.taints.{index}.effect"),
            &taint.effect,
            TAINT_EFFECTS,
            &mut out,
        );
    }

    if spec.replicas.is_some_and(|r| r < 0) {
        out.error_at("spec.replicas", "Invalid replica count", "replicas cannot be negative.");
    }
    if spec.min_replicas.is_some_and(|r| r < 0) {
        out.error_at(
            "spec.min_replicas",
            "Invalid replica count",
            "min_replicas cannot be negative.",
        );
    }
    if let Some(max) = spec.max_replicas {
        if max < 1 {
            out.error_at(
                "spec.max_replicas",
                "Invalid replica count",
                "max_replicas must be at least 1.",
            );
        }
        if let Some(min) = spec.min_replicas.filter(|min| *min > max) {
            out.error_at(
                "spec.min_replicas",
                "Invalid autoscaler bounds",
                format!("min_replicas ({min}) cannot be greater than max_replicas ({max})."),
            );
        }
    }

    out
}

/// Cloud provider of a cluster as reported by the API.
#[must_use]
pub fn cluster_provider(cluster: &Cluster) -> Option<CloudProvider> {
    let cloud = cluster.spec.cloud.as_ref()?;
    if cloud.aws.is_some() {
        Some(CloudProvider::Aws)
    } else if cloud.openstack.is_some() {
        Some(CloudProvider::Openstack)
    } else if cloud.azure.is_some() {
        Some(CloudProvider::Azure)
    } else {
        None
    }
}

/// Control-plane version of a cluster as reported by the API.
#[must_use]
pub fn cluster_version(cluster: &Cluster) -> Option<&str> {
    cluster
        .spec
        .version
        .as_deref()
        .filter(|v| !v.is_empty())
        .or_else(|| {
            cluster
                .status
                .as_ref()
                .map(|s| s.version.as_str())
                .filter(|v| !v.is_empty())
        })
}

/// Server-side node deployment checks.
#[derive(Debug, Clone, Copy)]
pub struct NodeDeploymentValidator<'a> {
    client: &'a MetaKubeClient,
}

impl<'a> NodeDeploymentValidator<'a> {
    /// Creates a validator backed by `client`.
    #[must_use]
    pub const fn new(client: &'a MetaKubeClient) -> Self {
        Self { client }
    }

    /// Runs local checks, then provider and version checks against `cluster`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kubelet version list cannot be fetched.
    pub async fn validate(&self, model: &NodeDeploymentModel, cluster: &Cluster) -> Result<Diagnostics> {
        let mut out = validate_node_deployment_local(model);
        if out.has_errors() {
            return Ok(out);
        }

        out.extend(provider_matches(model, cluster));
        if let (Some(kubelet), Some(version)) = (model.kubelet_version(), cluster_version(cluster)) {
            out.extend(self.version_skew(kubelet, version).await?);
        }
        Ok(out)
    }

    /// The kubelet may not be newer than the control plane and must be
    /// offered, unrestricted, for that control-plane version.
    ///
    /// # Errors
    ///
    /// Returns an error if the kubelet version list cannot be fetched.
    pub async fn version_skew(&self, kubelet: &str, cluster_version: &str) -> Result<Diagnostics> {
        const ATTR: &str = "spec.template.versions.kubelet";
        let mut out = Diagnostics::new();

        if let (Ok(node), Ok(control_plane)) = (parse_version(kubelet), parse_version(cluster_version)) {
            if node > control_plane {
                out.error_at(
                    ATTR,
                    format!(
                        "node deployment version ({kubelet}) cannot be greater than cluster version ({cluster_version})"
                    ),
                    "",
                );
                return Ok(out);
            }
        }

        let versions = self.client.node_upgrades(cluster_version).await?;
        match versions.iter().find(|v| same_version(&v.version, kubelet)) {
            None => {
                let names: Vec<String> = versions.iter().map(|v| v.version.clone()).collect();
                out.error_at(
                    ATTR,
                    format!("Unknown kubelet version {kubelet}"),
                    available(&format!("kubelet versions for {cluster_version}"), &names),
                );
            }
            Some(v) if v.restricted_by_kubelet_version => {
                out.error_at(
                    ATTR,
                    format!("Kubelet version {kubelet} is restricted"),
                    format!("Version {kubelet} cannot be used with cluster version {cluster_version}."),
                );
            }
            Some(_) => {}
        }
        Ok(out)
    }
}

fn provider_matches(model: &NodeDeploymentModel, cluster: &Cluster) -> Diagnostics {
    let mut out = Diagnostics::new();
    if let (Some(node), Some(cluster_cloud)) = (model.spec.template.cloud.provider(), cluster_provider(cluster)) {
        if node != cluster_cloud {
            out.error_at(
                format!("spec.template.cloud.{node}"),
                "Cloud provider mismatch",
                format!("Cluster {} runs on {cluster_cloud}, not {node}.", cluster.id),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{AwsCloudSpec, ClusterSpec, CloudSpec};
    use crate::schema::node_deployment::{
        NodeCloudModel, NodeDeploymentSpecModel, NodeTemplateModel, OpenstackNodeModel,
        OperatingSystemModel, TaintModel, UbuntuModel,
    };

    fn model() -> NodeDeploymentModel {
        NodeDeploymentModel {
            cluster_id: String::from("abc"),
            spec: NodeDeploymentSpecModel {
                replicas: Some(2),
                template: NodeTemplateModel {
                    cloud: NodeCloudModel {
                        openstack: Some(OpenstackNodeModel::default()),
                        ..NodeCloudModel::default()
                    },
                    operating_system: OperatingSystemModel {
                        ubuntu: Some(UbuntuModel::default()),
                        flatcar: None,
                    },
                    ..NodeTemplateModel::default()
                },
                ..NodeDeploymentSpecModel::default()
            },
            ..NodeDeploymentModel::default()
        }
    }

    #[test]
    fn test_valid_model_passes() {
        assert!(validate_node_deployment_local(&model()).is_empty());
    }

    #[test]
    fn test_kubernetes_io_node_labels_are_allowed() {
        let mut nd = model();
        let labels = &mut nd.spec.template.labels;
        labels.insert(String::from("node-role.kubernetes.io/worker"), String::from("true"));
        labels.insert(String::from("metakube-pool"), String::from("a"));
        assert!(validate_node_deployment_local(&nd).is_empty());

        nd.spec
            .template
            .labels
            .insert(String::from("system/cluster"), String::from("abc"));
        let out = validate_node_deployment_local(&nd);
        assert_eq!(
            out.iter().next().and_then(|d| d.attribute.as_deref()),
            Some("spec.template.labels.system/cluster")
        );
    }

    #[test]
    fn test_autoscaler_bounds() {
        let mut nd = model();
        nd.spec.min_replicas = Some(5);
        nd.spec.max_replicas = Some(3);

        let out = validate_node_deployment_local(&nd);
        assert!(
            out.errors()
                .any(|d| d.summary == "Invalid autoscaler bounds")
        );

        nd.spec.min_replicas = Some(0);
        nd.spec.max_replicas = Some(0);
        assert!(validate_node_deployment_local(&nd).has_errors());
    }

    #[test]
    fn test_missing_os_and_bad_taint() {
        let mut nd = model();
        nd.spec.template.operating_system = OperatingSystemModel::default();
        nd.spec.template.taints.push(TaintModel {
            effect: String::from("Sometimes"),
            key: String::from("k"),
            value: String::new(),
        });

        let out = validate_node_deployment_local(&nd);
        assert_eq!(out.errors().count(), 2);
    }

    #[test]
    fn test_provider_mismatch() {
        let cluster = Cluster {
            id: String::from("abc"),
            spec: ClusterSpec {
                cloud: Some(CloudSpec {
                    aws: Some(AwsCloudSpec::default()),
                    ..CloudSpec::default()
                }),
                ..ClusterSpec::default()
            },
            ..Cluster::default()
        };

        assert_eq!(cluster_provider(&cluster), Some(CloudProvider::Aws));
        assert!(provider_matches(&model(), &cluster).has_errors());
    }
}
