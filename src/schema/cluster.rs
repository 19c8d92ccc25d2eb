//! `metakube_cluster` model and schema.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::timeouts::Timeouts;
use super::{AttrType, Attribute, DefaultValue, Schema};

/// Accepted `spec.ip_family` values.
pub const IP_FAMILIES: &[&str] = &["IPv4", "IPv4+IPv6"];

/// Accepted `spec.cni_plugin.type` values.
pub const CNI_PLUGINS: &[&str] = &["canal", "cilium", "none"];

/// A managed cluster as seen by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterModel {
    /// Cluster id; empty until created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning project; discovered by scanning when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Human readable name.
    pub name: String,
    /// Datacenter name.
    pub dc_name: String,
    /// User-visible labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Project SSH key ids assigned to the cluster.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub sshkeys: BTreeSet<String>,
    /// Specification.
    pub spec: ClusterSpecModel,
    /// Operation timeouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
    /// Creation time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    /// Deletion time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
    /// Standard kubeconfig.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<String>,
    /// OIDC kubeconfig.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_kube_config: Option<String>,
    /// kubelogin kubeconfig.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_login_kube_config: Option<String>,
}

/// Cluster specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpecModel {
    /// Kubernetes version.
    pub version: String,
    /// Weekly maintenance window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_window: Option<UpdateWindowModel>,
    /// User SSH key agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ssh_agent: Option<bool>,
    /// Audit logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_logging: Option<bool>,
    /// Pod security policy admission plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_security_policy: Option<bool>,
    /// Pod node selector admission plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_node_selector: Option<bool>,
    /// `IPv4` or `IPv4+IPv6`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_family: Option<String>,
    /// Service CIDR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_cidr: Option<String>,
    /// Pod CIDR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods_cidr: Option<String>,
    /// CNI plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni_plugin: Option<CniPluginModel>,
    /// Cloud provider block.
    pub cloud: ClusterCloudModel,
    /// SysEleven OIDC configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syseleven_auth: Option<SysElevenAuthModel>,
}

/// Weekly maintenance window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWindowModel {
    /// Start, e.g. `Tue 02:00`.
    pub start: String,
    /// Length, e.g. `2h`.
    pub length: String,
}

/// CNI plugin selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CniPluginModel {
    /// Plugin type.
    #[serde(rename = "type")]
    pub plugin_type: String,
}

/// SysEleven OIDC configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysElevenAuthModel {
    /// OIDC realm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// IAM based authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_authentication: Option<bool>,
}

/// Exactly one of the provider blocks is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCloudModel {
    /// AWS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCloudModel>,
    /// OpenStack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackCloudModel>,
    /// Azure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCloudModel>,
}

/// Provider of a cloud block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    /// AWS.
    Aws,
    /// OpenStack.
    Openstack,
    /// Azure.
    Azure,
}

impl CloudProvider {
    /// Block name as written in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Openstack => "openstack",
            Self::Azure => "azure",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClusterCloudModel {
    /// Returns the providers whose block is present.
    #[must_use]
    pub fn providers(&self) -> Vec<CloudProvider> {
        let mut providers = Vec::new();
        if self.aws.is_some() {
            providers.push(CloudProvider::Aws);
        }
        if self.openstack.is_some() {
            providers.push(CloudProvider::Openstack);
        }
        if self.azure.is_some() {
            providers.push(CloudProvider::Azure);
        }
        providers
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

/// AWS cluster settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsCloudModel {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// VPC id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    /// Security group id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    /// Route table id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table_id: Option<String>,
    /// Instance profile name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_profile_name: Option<String>,
    /// Control plane role ARN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    /// OpenStack project billed for the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_billing_tenant: Option<String>,
}

/// OpenStack cluster settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenstackCloudModel {
    /// Floating IP pool (external network) name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip_pool: Option<String>,
    /// Security group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<String>,
    /// Network name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Subnet id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Server group id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_group_id: Option<String>,
    /// User credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_credentials: Option<OpenstackUserCredentials>,
    /// Application credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_credentials: Option<OpenstackApplicationCredentials>,
}

/// OpenStack user credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenstackUserCredentials {
    /// Project id.
    #[serde(default)]
    pub project_id: String,
    /// Project name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// User name.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// OpenStack application credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenstackApplicationCredentials {
    /// Credential id.
    #[serde(default)]
    pub id: String,
    /// Credential secret.
    #[serde(default)]
    pub secret: String,
}

/// Azure cluster settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureCloudModel {
    /// Service principal client id.
    pub client_id: String,
    /// Service principal secret.
    pub client_secret: String,
    /// Tenant id.
    pub tenant_id: String,
    /// Subscription id.
    pub subscription_id: String,
    /// Resource group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    /// Route table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table: Option<String>,
    /// Security group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<String>,
    /// Subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Virtual network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnet: Option<String>,
    /// Availability set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_set: Option<String>,
}

/// Attribute table of `metakube_cluster`.
pub const SCHEMA: Schema = Schema {
    type_name: "metakube_cluster",
    attributes: &[
        Attribute::computed("id", AttrType::String),
        Attribute::optional_computed("project_id", AttrType::String).force_new(),
        Attribute::required("name", AttrType::String),
        Attribute::required("dc_name", AttrType::String).force_new(),
        Attribute::optional("labels", AttrType::Map),
        Attribute::optional("sshkeys", AttrType::Set),
        Attribute::required("spec", AttrType::Block),
        Attribute::required("spec.version", AttrType::String),
        Attribute::optional("spec.update_window", AttrType::Block),
        Attribute::required("spec.update_window.start", AttrType::String),
        Attribute::required("spec.update_window.length", AttrType::String),
        Attribute::optional_computed("spec.enable_ssh_agent", AttrType::Bool),
        Attribute::optional("spec.audit_logging", AttrType::Bool),
        Attribute::optional("spec.pod_security_policy", AttrType::Bool),
        Attribute::optional("spec.pod_node_selector", AttrType::Bool),
        Attribute::optional_computed("spec.ip_family", AttrType::String)
            .with_default(DefaultValue::Str("IPv4")),
        Attribute::optional_computed("spec.services_cidr", AttrType::String).force_new(),
        Attribute::optional_computed("spec.pods_cidr", AttrType::String).force_new(),
        Attribute::optional_computed("spec.cni_plugin", AttrType::Block),
        Attribute::required("spec.cni_plugin.type", AttrType::String)
            .with_default(DefaultValue::Str("canal")),
        Attribute::required("spec.cloud", AttrType::Block),
        Attribute::optional("spec.cloud.aws", AttrType::Block),
        Attribute::required("spec.cloud.aws.access_key_id", AttrType::String)
            .sensitive()
            .force_new(),
        Attribute::required("spec.cloud.aws.secret_access_key", AttrType::String)
            .sensitive()
            .with_default(DefaultValue::PriorState),
        Attribute::optional_computed("spec.cloud.aws.vpc_id", AttrType::String).force_new(),
        Attribute::optional_computed("spec.cloud.aws.security_group_id", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.aws.route_table_id", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.aws.instance_profile_name", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.aws.role_arn", AttrType::String).force_new(),
        Attribute::optional("spec.cloud.aws.openstack_billing_tenant", AttrType::String)
            .with_default(DefaultValue::Env(&["OS_PROJECT_NAME"])),
        Attribute::optional("spec.cloud.openstack", AttrType::Block),
        Attribute::optional_computed("spec.cloud.openstack.floating_ip_pool", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.openstack.security_group", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.openstack.network", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.openstack.subnet_id", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.openstack.server_group_id", AttrType::String)
            .force_new(),
        Attribute::optional("spec.cloud.openstack.user_credentials", AttrType::Block),
        Attribute::required(
            "spec.cloud.openstack.user_credentials.project_id",
            AttrType::String,
        )
        .force_new()
        .with_default(DefaultValue::Env(&["OS_PROJECT_ID"])),
        Attribute::optional(
            "spec.cloud.openstack.user_credentials.project_name",
            AttrType::String,
        )
        .with_default(DefaultValue::Env(&["OS_PROJECT_NAME"])),
        Attribute::required(
            "spec.cloud.openstack.user_credentials.username",
            AttrType::String,
        )
        .sensitive()
        .with_default(DefaultValue::Env(&["OS_USERNAME"])),
        Attribute::required(
            "spec.cloud.openstack.user_credentials.password",
            AttrType::String,
        )
        .sensitive()
        .with_default(DefaultValue::Env(&["OS_PASSWORD"])),
        Attribute::optional("spec.cloud.openstack.application_credentials", AttrType::Block),
        Attribute::required(
            "spec.cloud.openstack.application_credentials.id",
            AttrType::String,
        )
        .sensitive()
        .with_default(DefaultValue::Env(&["OS_APPLICATION_CREDENTIAL_ID"])),
        Attribute::required(
            "spec.cloud.openstack.application_credentials.secret",
            AttrType::String,
        )
        .sensitive()
        .with_default(DefaultValue::Env(&["OS_APPLICATION_CREDENTIAL_SECRET"])),
        Attribute::optional("spec.cloud.azure", AttrType::Block),
        Attribute::required("spec.cloud.azure.client_id", AttrType::String)
            .sensitive()
            .force_new(),
        Attribute::required("spec.cloud.azure.client_secret", AttrType::String)
            .sensitive()
            .with_default(DefaultValue::PriorState),
        Attribute::required("spec.cloud.azure.tenant_id", AttrType::String)
            .sensitive()
            .force_new(),
        Attribute::required("spec.cloud.azure.subscription_id", AttrType::String)
            .sensitive()
            .force_new(),
        Attribute::optional_computed("spec.cloud.azure.resource_group", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.azure.route_table", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.azure.security_group", AttrType::String)
            .force_new(),
        Attribute::optional_computed("spec.cloud.azure.subnet", AttrType::String).force_new(),
        Attribute::optional_computed("spec.cloud.azure.vnet", AttrType::String).force_new(),
        Attribute::optional_computed("spec.cloud.azure.availability_set", AttrType::String)
            .force_new(),
        Attribute::optional("spec.syseleven_auth", AttrType::Block),
        Attribute::optional("spec.syseleven_auth.realm", AttrType::String),
        Attribute::optional("spec.syseleven_auth.iam_authentication", AttrType::Bool),
        Attribute::optional("timeouts", AttrType::Block),
        Attribute::optional("timeouts.create", AttrType::String),
        Attribute::optional("timeouts.update", AttrType::String),
        Attribute::optional("timeouts.delete", AttrType::String),
        Attribute::computed("creation_timestamp", AttrType::String),
        Attribute::computed("deletion_timestamp", AttrType::String),
        Attribute::computed("kube_config", AttrType::String).sensitive(),
        Attribute::computed("oidc_kube_config", AttrType::String).sensitive(),
        Attribute::computed("kube_login_kube_config", AttrType::String).sensitive(),
    ],
};

impl ClusterModel {
    /// Returns the project id when it is known.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project_id.as_deref().filter(|p| !p.is_empty())
    }

    /// Returns the cluster id when it is known.
    #[must_use]
    pub fn cluster_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns the SysEleven realm when one is configured.
    #[must_use]
    pub fn syseleven_realm(&self) -> Option<&str> {
        self.spec
            .syseleven_auth
            .as_ref()
            .and_then(|auth| auth.realm.as_deref())
            .filter(|realm| !realm.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openstack_env_defaults_fill_user_credentials() {
        let env = |name: &str| match name {
            "OS_USERNAME" => Some(String::from("u")),
            "OS_PASSWORD" => Some(String::from("p")),
            "OS_PROJECT_ID" => Some(String::from("pid")),
            "OS_APPLICATION_CREDENTIAL_ID" => Some(String::from("app")),
            _ => None,
        };
        let raw = json!({
            "name": "c",
            "dc_name": "dbl1",
            "spec": {
                "version": "1.28.5",
                "cloud": {"openstack": {"user_credentials": {}}}
            }
        });

        let model: ClusterModel = SCHEMA.decode(raw, None, &env).expect("should decode");
        let creds = model
            .spec
            .cloud
            .openstack
            .and_then(|o| o.user_credentials)
            .expect("user credentials");
        assert_eq!(creds.username, "u");
        assert_eq!(creds.password, "p");
        assert_eq!(creds.project_id, "pid");
        assert_eq!(model.spec.ip_family.as_deref(), Some("IPv4"));
    }

    #[test]
    fn test_missing_version_is_attribute_scoped() {
        let raw = json!({"name": "c", "dc_name": "dbl1", "spec": {"cloud": {}}});
        let err = SCHEMA
            .decode::<ClusterModel>(raw, None, &crate::schema::no_env)
            .expect_err("should fail");

        let diagnostics = err.to_diagnostics();
        assert!(
            diagnostics
                .iter()
                .any(|d| d.attribute.as_deref() == Some("spec.version"))
        );
    }

    #[test]
    fn test_dc_name_change_forces_replacement() {
        let prior = json!({"dc_name": "dbl1", "spec": {"pods_cidr": "172.25.0.0/16"}});
        let plan = json!({"dc_name": "cbk1", "spec": {"pods_cidr": "172.25.0.0/16"}});

        assert_eq!(SCHEMA.requires_replacement(&prior, &plan), vec!["dc_name"]);
    }

    #[test]
    fn test_cloud_provider_detection() {
        let cloud = ClusterCloudModel {
            aws: Some(AwsCloudModel::default()),
            ..ClusterCloudModel::default()
        };
        assert_eq!(cloud.provider(), Some(CloudProvider::Aws));
        assert_eq!(ClusterCloudModel::default().provider(), None);
    }
}
