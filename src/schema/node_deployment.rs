//! `metakube_node_deployment` model and schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cluster::CloudProvider;
use super::timeouts::Timeouts;
use super::{AttrType, Attribute, Schema};

/// Accepted taint effects.
pub const TAINT_EFFECTS: &[&str] = &["NoSchedule", "PreferNoSchedule", "NoExecute"];

/// A node deployment as seen by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDeploymentModel {
    /// Node deployment id; empty until created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning project; discovered by scanning when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Parent cluster.
    pub cluster_id: String,
    /// Name; generated by the server when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Specification.
    pub spec: NodeDeploymentSpecModel,
    /// Operation timeouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
    /// Creation time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    /// Deletion time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
}

/// Node deployment specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDeploymentSpecModel {
    /// Fixed replica count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Autoscaler lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
    /// Autoscaler upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    /// Machine template.
    pub template: NodeTemplateModel,
}

/// Machine template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTemplateModel {
    /// Cloud-specific machine settings.
    pub cloud: NodeCloudModel,
    /// Operating system.
    pub operating_system: OperatingSystemModel,
    /// Component versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<NodeVersionsModel>,
    /// User-visible node labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Every label including server-managed ones; read-only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub all_labels: BTreeMap<String, String>,
    /// Annotations on Kubernetes node objects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_annotations: BTreeMap<String, String>,
    /// Annotations on machine objects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub machine_annotations: BTreeMap<String, String>,
    /// Taints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<TaintModel>,
}

/// Exactly one of the provider blocks is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCloudModel {
    /// AWS machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNodeModel>,
    /// OpenStack machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackNodeModel>,
    /// Azure machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureNodeModel>,
}

impl NodeCloudModel {
    /// Returns the providers whose block is present.
    #[must_use]
    pub fn providers(&self) -> Vec<CloudProvider> {
        [
            (self.aws.is_some(), CloudProvider::Aws),
            (self.openstack.is_some(), CloudProvider::Openstack),
            (self.azure.is_some(), CloudProvider::Azure),
        ]
        .into_iter()
        .filter_map(|(present, provider)| present.then_some(provider))
        .collect()
    }

    /// Returns the single configured provider.
    #[must_use]
    pub fn provider(&self) -> Option<CloudProvider> {
        match self.providers().as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }
}

/// AWS machine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsNodeModel {
    /// Instance type.
    pub instance_type: String,
    /// Root disk size in GB.
    pub disk_size: i64,
    /// EBS volume type.
    pub volume_type: String,
    /// Availability zone.
    pub availability_zone: String,
    /// Subnet id.
    pub subnet_id: String,
    /// Whether to assign a public IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_public_ip: Option<bool>,
    /// AMI override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami: Option<String>,
    /// Instance tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// OpenStack machine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenstackNodeModel {
    /// Flavor.
    pub flavor: String,
    /// Image name.
    pub image: String,
    /// Root disk size in GB, when booting from volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i64>,
    /// Whether to attach a floating IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_floating_ip: Option<bool>,
    /// Instance tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Azure machine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureNodeModel {
    /// VM size.
    pub size: String,
    /// Image id override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Data disk size in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i32>,
    /// OS disk size in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_disk_size_gb: Option<i32>,
    /// Whether to assign a public IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_public_ip: Option<bool>,
    /// Availability zones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    /// VM tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Exactly one operating system block is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystemModel {
    /// Ubuntu.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubuntu: Option<UbuntuModel>,
    /// Flatcar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatcar: Option<FlatcarModel>,
}

impl OperatingSystemModel {
    /// Number of operating system blocks present.
    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.ubuntu.is_some()) + usize::from(self.flatcar.is_some())
    }
}

/// Ubuntu options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UbuntuModel {
    /// Run `dist-upgrade` on first boot.
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}

/// Flatcar options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatcarModel {
    /// Disable automatic updates.
    #[serde(default)]
    pub disable_auto_update: bool,
}

/// Component versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersionsModel {
    /// Kubelet version; follows the cluster when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<String>,
}

/// A node taint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintModel {
    /// Effect.
    pub effect: String,
    /// Key.
    pub key: String,
    /// Value.
    #[serde(default)]
    pub value: String,
}

/// Attribute table of `metakube_node_deployment`.
pub const SCHEMA: Schema = Schema {
    type_name: "metakube_node_deployment",
    attributes: &[
        Attribute::computed("id", AttrType::String),
        Attribute::optional_computed("project_id", AttrType::String).force_new(),
        Attribute::required("cluster_id", AttrType::String).force_new(),
        Attribute::optional_computed("name", AttrType::String).force_new(),
        Attribute::required("spec", AttrType::Block),
        Attribute::optional_computed("spec.replicas", AttrType::Int),
        Attribute::optional("spec.min_replicas", AttrType::Int),
        Attribute::optional("spec.max_replicas", AttrType::Int),
        Attribute::required("spec.template", AttrType::Block),
        Attribute::required("spec.template.cloud", AttrType::Block),
        Attribute::optional("spec.template.cloud.aws", AttrType::Block),
        Attribute::required("spec.template.cloud.aws.instance_type", AttrType::String),
        Attribute::required("spec.template.cloud.aws.disk_size", AttrType::Int),
        Attribute::required("spec.template.cloud.aws.volume_type", AttrType::String),
        Attribute::required("spec.template.cloud.aws.availability_zone", AttrType::String),
        Attribute::required("spec.template.cloud.aws.subnet_id", AttrType::String),
        Attribute::optional("spec.template.cloud.aws.assign_public_ip", AttrType::Bool),
        Attribute::optional_computed("spec.template.cloud.aws.ami", AttrType::String),
        Attribute::optional("spec.template.cloud.aws.tags", AttrType::Map),
        Attribute::optional("spec.template.cloud.openstack", AttrType::Block),
        Attribute::required("spec.template.cloud.openstack.flavor", AttrType::String),
        Attribute::required("spec.template.cloud.openstack.image", AttrType::String),
        Attribute::optional("spec.template.cloud.openstack.disk_size", AttrType::Int),
        Attribute::optional("spec.template.cloud.openstack.use_floating_ip", AttrType::Bool),
        Attribute::optional("spec.template.cloud.openstack.tags", AttrType::Map),
        Attribute::optional("spec.template.cloud.azure", AttrType::Block),
        Attribute::required("spec.template.cloud.azure.size", AttrType::String),
        Attribute::optional_computed("spec.template.cloud.azure.image_id", AttrType::String),
        Attribute::optional("spec.template.cloud.azure.disk_size_gb", AttrType::Int),
        Attribute::optional("spec.template.cloud.azure.os_disk_size_gb", AttrType::Int),
        Attribute::optional("spec.template.cloud.azure.assign_public_ip", AttrType::Bool),
        Attribute::optional("spec.template.cloud.azure.zones", AttrType::Set),
        Attribute::optional("spec.template.cloud.azure.tags", AttrType::Map),
        Attribute::required("spec.template.operating_system", AttrType::Block),
        Attribute::optional("spec.template.operating_system.ubuntu", AttrType::Block),
        Attribute::optional(
            "spec.template.operating_system.ubuntu.dist_upgrade_on_boot",
            AttrType::Bool,
        ),
        Attribute::optional("spec.template.operating_system.flatcar", AttrType::Block),
        Attribute::optional(
            "spec.template.operating_system.flatcar.disable_auto_update",
            AttrType::Bool,
        ),
        Attribute::optional("spec.template.versions", AttrType::Block),
        Attribute::optional_computed("spec.template.versions.kubelet", AttrType::String),
        Attribute::optional("spec.template.labels", AttrType::Map),
        Attribute::computed("spec.template.all_labels", AttrType::Map),
        Attribute::optional("spec.template.node_annotations", AttrType::Map),
        Attribute::optional("spec.template.machine_annotations", AttrType::Map),
        Attribute::optional("spec.template.taints", AttrType::List),
        Attribute::optional("timeouts", AttrType::Block),
        Attribute::optional("timeouts.create", AttrType::String),
        Attribute::optional("timeouts.update", AttrType::String),
        Attribute::optional("timeouts.delete", AttrType::String),
        Attribute::computed("creation_timestamp", AttrType::String),
        Attribute::computed("deletion_timestamp", AttrType::String),
    ],
};

impl NodeDeploymentModel {
    /// Returns the project id when it is known.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project_id.as_deref().filter(|p| !p.is_empty())
    }

    /// Returns the node deployment id when it is known.
    #[must_use]
    pub fn deployment_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns the declared kubelet version.
    #[must_use]
    pub fn kubelet_version(&self) -> Option<&str> {
        self.spec
            .template
            .versions
            .as_ref()
            .and_then(|v| v.kubelet.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Returns true when autoscaler bounds are configured.
    #[must_use]
    pub const fn has_autoscaler(&self) -> bool {
        self.spec.min_replicas.is_some() || self.spec.max_replicas.is_some()
    }
}
