//! MetaKube API types and data structures.
//!
//! Request bodies and response envelopes exchanged with the MetaKube REST API.
//! Every optional field is skipped when unset so that partial payloads only
//! carry what the caller chose to include.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A project owning clusters and SSH keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Project phase, e.g. `Active`.
    #[serde(default)]
    pub status: String,
    /// Project labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A managed cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Cluster identifier, assigned by the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Labels, including platform-managed ones.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Deletion time, set while the cluster is being torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// Cluster specification.
    #[serde(default)]
    pub spec: ClusterSpec,
    /// Observed status.
    #[serde(default, skip_serializing)]
    pub status: Option<ClusterStatus>,
}

/// Observed cluster status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Control-plane version currently running.
    #[serde(default)]
    pub version: String,
    /// API server URL.
    #[serde(default)]
    pub url: String,
}

/// Cluster specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Kubernetes version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Cloud provider block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudSpec>,
    /// Pod and service networking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetwork>,
    /// Container network interface selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni_plugin: Option<CniPlugin>,
    /// Audit logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_logging: Option<AuditLogging>,
    /// Pod security policy admission plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_pod_security_policy_admission_plugin: Option<bool>,
    /// Pod node selector admission plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_pod_node_selector_admission_plugin: Option<bool>,
    /// User SSH key agent.
    #[serde(
        default,
        rename = "enableUserSSHKeyAgent",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_user_ssh_key_agent: Option<bool>,
    /// Weekly maintenance window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_window: Option<UpdateWindow>,
    /// SysEleven OIDC realm configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syseleven_auth: Option<SysElevenAuth>,
    /// Account to bill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_tenant: Option<String>,
}

/// Cloud provider block of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSpec {
    /// Datacenter name.
    #[serde(default, rename = "dc")]
    pub datacenter_name: String,
    /// AWS settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCloudSpec>,
    /// OpenStack settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackCloudSpec>,
    /// Azure settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCloudSpec>,
}

/// AWS cluster settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCloudSpec {
    /// Access key id.
    #[serde(default, rename = "accessKeyId", skip_serializing_if = "String::is_empty")]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_access_key: String,
    /// VPC id.
    #[serde(default, rename = "vpcId", skip_serializing_if = "String::is_empty")]
    pub vpc_id: String,
    /// Security group id.
    #[serde(default, rename = "securityGroupID", skip_serializing_if = "String::is_empty")]
    pub security_group_id: String,
    /// Route table id.
    #[serde(default, rename = "routeTableId", skip_serializing_if = "String::is_empty")]
    pub route_table_id: String,
    /// Instance profile name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_profile_name: String,
    /// Control plane role ARN.
    #[serde(default, rename = "roleARN", skip_serializing_if = "String::is_empty")]
    pub role_arn: String,
    /// OpenStack project billed for the AWS cluster.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub openstack_billing_tenant: String,
}

/// OpenStack cluster settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackCloudSpec {
    /// Keystone domain.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    /// Floating IP pool name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub floating_ip_pool: String,
    /// Network name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,
    /// Subnet id.
    #[serde(default, rename = "subnetID", skip_serializing_if = "String::is_empty")]
    pub subnet_id: String,
    /// Security group name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_groups: String,
    /// Server group id.
    #[serde(default, rename = "serverGroupID", skip_serializing_if = "String::is_empty")]
    pub server_group_id: String,
    /// User name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Password.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Project (tenant) name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    /// Project (tenant) id.
    #[serde(default, rename = "projectID", skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    /// Application credential id.
    #[serde(
        default,
        rename = "applicationCredentialID",
        skip_serializing_if = "String::is_empty"
    )]
    pub application_credential_id: String,
    /// Application credential secret.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application_credential_secret: String,
}

/// Azure cluster settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCloudSpec {
    /// Service principal client id.
    #[serde(default, rename = "clientID", skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    /// Service principal secret.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    /// Tenant id.
    #[serde(default, rename = "tenantID", skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
    /// Subscription id.
    #[serde(default, rename = "subscriptionID", skip_serializing_if = "String::is_empty")]
    pub subscription_id: String,
    /// Resource group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group: String,
    /// Route table.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub route_table: String,
    /// Security group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_group: String,
    /// Subnet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet: String,
    /// Virtual network.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vnet: String,
    /// Availability set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_set: String,
}

/// Pod and service networking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetwork {
    /// `IPv4` or `IPv4+IPv6`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_family: Option<String>,
    /// Pod address ranges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<NetworkRanges>,
    /// Service address ranges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<NetworkRanges>,
}

/// A list of CIDR blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRanges {
    /// CIDR blocks.
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

/// CNI plugin selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CniPlugin {
    /// `canal`, `cilium` or `none`.
    #[serde(rename = "type", default)]
    pub plugin_type: String,
    /// Plugin version chosen by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Audit logging toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogging {
    /// Whether audit logging is enabled.
    #[serde(default)]
    pub enabled: bool,
}

/// Weekly maintenance window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWindow {
    /// Start, e.g. `Tue 02:00`.
    #[serde(default)]
    pub start: String,
    /// Length, e.g. `2h`.
    #[serde(default)]
    pub length: String,
}

/// SysEleven OIDC realm configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysElevenAuth {
    /// OIDC realm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// IAM based authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_authentication: Option<bool>,
}

/// Body of the create-cluster request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateClusterSpec {
    /// Cluster to create.
    pub cluster: Cluster,
}

/// Merge-patch body for a cluster update.
///
/// Label values of `None` serialize as `null`, which removes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterPatch {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Label changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, Option<String>>>,
    /// Specification changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<ClusterSpec>,
}

impl ClusterPatch {
    /// Returns true when the patch carries no change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.labels.is_none() && self.spec.is_none()
    }
}

/// Health of a single control-plane component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum HealthState {
    /// Not running.
    #[default]
    Down,
    /// Running.
    Up,
    /// Still coming up.
    Provisioning,
}

impl From<i64> for HealthState {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Up,
            2 => Self::Provisioning,
            _ => Self::Down,
        }
    }
}

impl From<HealthState> for i64 {
    fn from(value: HealthState) -> Self {
        match value {
            HealthState::Down => 0,
            HealthState::Up => 1,
            HealthState::Provisioning => 2,
        }
    }
}

/// Health of every control-plane component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHealth {
    /// API server.
    #[serde(default)]
    pub apiserver: HealthState,
    /// Cloud provider infrastructure.
    #[serde(default)]
    pub cloud_provider_infrastructure: HealthState,
    /// Controller manager.
    #[serde(default)]
    pub controller: HealthState,
    /// etcd.
    #[serde(default)]
    pub etcd: HealthState,
    /// Machine controller.
    #[serde(default)]
    pub machine_controller: HealthState,
    /// Scheduler.
    #[serde(default)]
    pub scheduler: HealthState,
    /// User cluster controller manager.
    #[serde(default)]
    pub user_cluster_controller_manager: HealthState,
}

impl ClusterHealth {
    /// Returns the names of components that are not up.
    #[must_use]
    pub fn components_not_up(&self) -> Vec<&'static str> {
        [
            ("apiserver", self.apiserver),
            ("cloud-provider-infra", self.cloud_provider_infrastructure),
            ("controller", self.controller),
            ("etcd", self.etcd),
            ("machine-controller", self.machine_controller),
            ("scheduler", self.scheduler),
            (
                "user-cluster-controller-manager",
                self.user_cluster_controller_manager,
            ),
        ]
        .into_iter()
        .filter(|(_, state)| *state != HealthState::Up)
        .map(|(name, _)| name)
        .collect()
    }
}

/// An SSH key registered in a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKey {
    /// Key identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Key name.
    pub name: String,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Key material.
    #[serde(default)]
    pub spec: SshKeySpec,
}

/// SSH key material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKeySpec {
    /// Public key in authorized_keys format.
    #[serde(default)]
    pub public_key: String,
    /// Fingerprint computed by the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
}

/// A machine deployment (node pool).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeployment {
    /// Identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Deletion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// Specification.
    #[serde(default)]
    pub spec: NodeDeploymentSpec,
    /// Observed status.
    #[serde(default, skip_serializing)]
    pub status: Option<NodeDeploymentStatus>,
}

/// Node deployment specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeploymentSpec {
    /// Desired replicas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Autoscaler lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
    /// Autoscaler upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    /// Machine template.
    #[serde(default)]
    pub template: NodeSpec,
    /// Whether rollouts are paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

/// Machine template of a node deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Cloud-specific machine settings.
    #[serde(default)]
    pub cloud: NodeCloudSpec,
    /// Operating system settings.
    #[serde(default)]
    pub operating_system: OperatingSystemSpec,
    /// Component versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<NodeVersionInfo>,
    /// Node labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Node taints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
    /// Annotations set on the Kubernetes node objects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_annotations: BTreeMap<String, String>,
    /// Annotations set on the machine objects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub machine_annotations: BTreeMap<String, String>,
}

/// Cloud-specific machine settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCloudSpec {
    /// AWS machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNodeSpec>,
    /// OpenStack machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackNodeSpec>,
    /// Azure machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureNodeSpec>,
}

/// AWS machine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsNodeSpec {
    /// Instance type.
    #[serde(default)]
    pub instance_type: String,
    /// Root disk size in GB.
    #[serde(default)]
    pub disk_size: i64,
    /// EBS volume type.
    #[serde(default)]
    pub volume_type: String,
    /// AMI override.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ami: String,
    /// Instance tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Availability zone.
    #[serde(default)]
    pub availability_zone: String,
    /// Subnet id.
    #[serde(default, rename = "subnetID")]
    pub subnet_id: String,
    /// Whether to assign a public IP.
    #[serde(default, rename = "assignPublicIP", skip_serializing_if = "Option::is_none")]
    pub assign_public_ip: Option<bool>,
}

/// OpenStack machine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackNodeSpec {
    /// Flavor.
    #[serde(default)]
    pub flavor: String,
    /// Image name.
    #[serde(default)]
    pub image: String,
    /// Root disk size in GB, when booting from volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i64>,
    /// Instance tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Whether to attach a floating IP.
    #[serde(default, rename = "useFloatingIP", skip_serializing_if = "Option::is_none")]
    pub use_floating_ip: Option<bool>,
}

/// Azure machine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureNodeSpec {
    /// VM size.
    #[serde(default)]
    pub size: String,
    /// Image id override.
    #[serde(default, rename = "imageID", skip_serializing_if = "String::is_empty")]
    pub image_id: String,
    /// Data disk size in GB.
    #[serde(default)]
    pub data_disk_size: i32,
    /// OS disk size in GB.
    #[serde(default, rename = "osDiskSize")]
    pub os_disk_size: i32,
    /// VM tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Whether to assign a public IP.
    #[serde(default, rename = "assignPublicIP", skip_serializing_if = "Option::is_none")]
    pub assign_public_ip: Option<bool>,
    /// Availability zones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

/// Operating system settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystemSpec {
    /// Ubuntu options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubuntu: Option<UbuntuSpec>,
    /// Flatcar options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatcar: Option<FlatcarSpec>,
}

/// Ubuntu options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UbuntuSpec {
    /// Run `dist-upgrade` on first boot.
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}

/// Flatcar options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatcarSpec {
    /// Disable automatic updates.
    #[serde(default)]
    pub disable_auto_update: bool,
}

/// Component versions of a node deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersionInfo {
    /// Kubelet version.
    #[serde(default)]
    pub kubelet: String,
}

/// A node taint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    /// `NoSchedule`, `PreferNoSchedule` or `NoExecute`.
    pub effect: String,
    /// Taint key.
    pub key: String,
    /// Taint value.
    #[serde(default)]
    pub value: String,
}

/// Observed node deployment status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeploymentStatus {
    /// Total replicas.
    #[serde(default)]
    pub replicas: i32,
    /// Replicas that are ready.
    #[serde(default)]
    pub ready_replicas: i32,
    /// Replicas that are available.
    #[serde(default)]
    pub available_replicas: i32,
    /// Replicas on the latest template.
    #[serde(default)]
    pub updated_replicas: i32,
    /// Replicas that are not available.
    #[serde(default)]
    pub unavailable_replicas: i32,
}

/// Merge-patch body for a node deployment update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeDeploymentPatch {
    /// Full desired specification.
    pub spec: NodeDeploymentSpec,
}

/// A Kubernetes node backing a node deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Identifier.
    #[serde(default)]
    pub id: String,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Observed status.
    #[serde(default)]
    pub status: Option<NodeStatus>,
}

/// Observed node status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// System information reported by the kubelet.
    #[serde(default)]
    pub node_info: Option<NodeSystemInfo>,
}

/// System information reported by the kubelet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSystemInfo {
    /// Kernel version.
    #[serde(default)]
    pub kernel_version: String,
    /// Kubelet version.
    #[serde(default)]
    pub kubelet_version: String,
}

impl Node {
    /// Returns true once the kubelet has reported its kernel version.
    #[must_use]
    pub fn has_kernel_version(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.node_info.as_ref())
            .is_some_and(|info| !info.kernel_version.is_empty())
    }
}

/// A datacenter offered by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datacenter {
    /// Metadata.
    #[serde(default)]
    pub metadata: DatacenterMeta,
    /// Provider settings.
    #[serde(default)]
    pub spec: DatacenterSpec,
}

/// Datacenter metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterMeta {
    /// Datacenter name.
    #[serde(default)]
    pub name: String,
}

/// Datacenter provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterSpec {
    /// Provider name.
    #[serde(default)]
    pub provider: String,
    /// Country code.
    #[serde(default)]
    pub country: String,
    /// Location.
    #[serde(default)]
    pub location: String,
    /// AWS region settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<serde_json::Value>,
    /// OpenStack region settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<serde_json::Value>,
    /// Azure region settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<serde_json::Value>,
}

/// A Kubernetes version offered by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterVersion {
    /// Version string.
    pub version: String,
    /// Whether this is the platform default.
    #[serde(default)]
    pub default: bool,
    /// Whether kubelets of this version are restricted for the control plane.
    #[serde(default)]
    pub restricted_by_kubelet_version: bool,
}

/// An OpenStack network visible with the supplied credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenstackNetwork {
    /// Network id.
    #[serde(default)]
    pub id: String,
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// External networks back floating IP pools.
    #[serde(default)]
    pub external: bool,
}

/// An OpenStack subnet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenstackSubnet {
    /// Subnet id.
    #[serde(default)]
    pub id: String,
    /// Subnet name.
    #[serde(default)]
    pub name: String,
}

/// Credentials forwarded as headers to the OpenStack validation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenstackCredentials {
    /// Datacenter the lookup runs against.
    pub datacenter: String,
    /// Keystone domain.
    pub domain: String,
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Project name.
    pub project: String,
    /// Project id.
    pub project_id: String,
    /// Application credential id.
    pub application_credential_id: String,
    /// Application credential secret.
    pub application_credential_secret: String,
}

/// Kind of a binding subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    /// A user, identified by e-mail.
    User,
    /// A group.
    Group,
}

/// A binding subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Kind.
    pub kind: SubjectKind,
    /// Name.
    pub name: String,
    /// API group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_group: String,
}

/// A namespaced role binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    /// Namespace.
    #[serde(default)]
    pub namespace: String,
    /// Bound role.
    #[serde(default)]
    pub role_ref_name: String,
    /// Subjects.
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// A cluster-wide role binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleBinding {
    /// Bound cluster role.
    #[serde(default)]
    pub role_ref_name: String,
    /// Subjects.
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// Body of bind/unbind requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUser {
    /// User e-mail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Group name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl RoleUser {
    /// Builds the body for one subject.
    #[must_use]
    pub fn for_subject(kind: SubjectKind, name: &str) -> Self {
        match kind {
            SubjectKind::User => Self {
                user_email: Some(name.to_string()),
                group: None,
            },
            SubjectKind::Group => Self {
                user_email: None,
                group: Some(name.to_string()),
            },
        }
    }
}
