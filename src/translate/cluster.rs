//! Cluster model ↔ API translation.

use crate::api::types::{
    AuditLogging, AwsCloudSpec, AzureCloudSpec, CloudSpec, Cluster, ClusterNetwork, ClusterPatch,
    ClusterSpec, CniPlugin, CreateClusterSpec, NetworkRanges, OpenstackCloudSpec,
    SysElevenAuth, UpdateWindow,
};
use crate::diagnostics::Diagnostics;
use crate::schema::cluster::{
    AwsCloudModel, AzureCloudModel, ClusterCloudModel, ClusterModel, ClusterSpecModel,
    CniPluginModel, OpenstackApplicationCredentials, OpenstackCloudModel,
    OpenstackUserCredentials, SysElevenAuthModel, UpdateWindowModel,
};

use super::labels::{label_changes, user_labels};
use super::{ChangeSet, first_non_empty, non_empty};

/// OpenStack domain sent on every request; the server never returns it.
pub const OPENSTACK_DOMAIN: &str = "Default";

/// CNI plugin the platform runs when none is selected.
pub const DEFAULT_CNI_PLUGIN: &str = "canal";

/// Values of the prior state, consulted when the server returns empty
/// values for fields it never echoes or a narrower form of what was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterPreserved {
    /// Prior AWS block.
    pub aws: Option<AwsCloudModel>,
    /// Prior OpenStack block.
    pub openstack: Option<OpenstackCloudModel>,
    /// Prior Azure block.
    pub azure: Option<AzureCloudModel>,
    /// Prior services CIDR text.
    pub services_cidr: Option<String>,
    /// Prior pods CIDR text.
    pub pods_cidr: Option<String>,
}

impl ClusterPreserved {
    /// Extracts the preserved values from a prior model.
    #[must_use]
    pub fn from_model(prior: &ClusterModel) -> Self {
        Self {
            aws: prior.spec.cloud.aws.clone(),
            openstack: prior.spec.cloud.openstack.clone(),
            azure: prior.spec.cloud.azure.clone(),
            services_cidr: prior.spec.services_cidr.clone(),
            pods_cidr: prior.spec.pods_cidr.clone(),
        }
    }
}

/// Splits a comma-separated CIDR list.
#[must_use]
pub fn split_cidrs(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Maps the server's CNI selection to the model; `none` and absent become `canal`.
#[must_use]
pub fn normalize_cni(plugin: Option<&CniPlugin>) -> String {
    match plugin.map(|p| p.plugin_type.as_str()) {
        None | Some("" | "none") => DEFAULT_CNI_PLUGIN.to_string(),
        Some(other) => other.to_string(),
    }
}

/// First server CIDR block. Keeps the prior text when its first entry is
/// that block, so a comma-separated value sent on create stays stable.
fn first_cidr(
    ranges: Option<&NetworkRanges>,
    prior: Option<&str>,
    attribute: &str,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let blocks = &ranges?.cidr_blocks;
    if blocks.len() > 1 {
        diagnostics.warn(
            format!("Multiple CIDR blocks returned for {attribute}"),
            format!(
                "The API returned {}; only the first one is tracked.",
                blocks.join(", ")
            ),
        );
    }
    let first = blocks.first().and_then(|cidr| non_empty(cidr))?;
    match prior {
        Some(text) if split_cidrs(text).first() == Some(&first) => Some(text.to_string()),
        _ => Some(first),
    }
}

/// Builds a model from an API cluster.
///
/// `project_id`, `sshkeys`, kubeconfigs and timeouts are not part of the
/// cluster object and are left for the caller to fill.
#[must_use]
pub fn flatten_cluster(
    cluster: &Cluster,
    preserved: &ClusterPreserved,
    diagnostics: &mut Diagnostics,
) -> ClusterModel {
    let spec = &cluster.spec;
    let network = spec.cluster_network.as_ref();
    let cloud = spec.cloud.as_ref();

    let version = first_non_empty(&[
        spec.version.as_deref(),
        cluster.status.as_ref().map(|s| s.version.as_str()),
    ])
    .unwrap_or_default();

    ClusterModel {
        id: non_empty(&cluster.id),
        name: cluster.name.clone(),
        dc_name: cloud.map(|c| c.datacenter_name.clone()).unwrap_or_default(),
        labels: user_labels(&cluster.labels),
        creation_timestamp: cluster.creation_timestamp.map(|t| t.to_rfc3339()),
        deletion_timestamp: cluster.deletion_timestamp.map(|t| t.to_rfc3339()),
        spec: ClusterSpecModel {
            version,
            update_window: spec
                .update_window
                .as_ref()
                .filter(|w| !w.start.is_empty() || !w.length.is_empty())
                .map(|w| UpdateWindowModel {
                    start: w.start.clone(),
                    length: w.length.clone(),
                }),
            enable_ssh_agent: spec.enable_user_ssh_key_agent,
            audit_logging: spec.audit_logging.as_ref().map(|a| a.enabled),
            pod_security_policy: spec.use_pod_security_policy_admission_plugin,
            pod_node_selector: spec.use_pod_node_selector_admission_plugin,
            ip_family: network
                .and_then(|n| n.ip_family.as_deref())
                .and_then(non_empty),
            services_cidr: first_cidr(
                network.and_then(|n| n.services.as_ref()),
                preserved.services_cidr.as_deref(),
                "spec.services_cidr",
                diagnostics,
            ),
            pods_cidr: first_cidr(
                network.and_then(|n| n.pods.as_ref()),
                preserved.pods_cidr.as_deref(),
                "spec.pods_cidr",
                diagnostics,
            ),
            cni_plugin: Some(CniPluginModel {
                plugin_type: normalize_cni(spec.cni_plugin.as_ref()),
            }),
            cloud: flatten_cloud(cloud, spec.billing_tenant.as_deref(), preserved),
            syseleven_auth: spec
                .syseleven_auth
                .as_ref()
                .filter(|a| a.realm.as_deref().is_some_and(|r| !r.is_empty()) || a.iam_authentication.is_some())
                .map(|a| SysElevenAuthModel {
                    realm: a.realm.as_deref().and_then(non_empty),
                    iam_authentication: a.iam_authentication,
                }),
        },
        ..ClusterModel::default()
    }
}

fn flatten_cloud(
    cloud: Option<&CloudSpec>,
    billing_tenant: Option<&str>,
    preserved: &ClusterPreserved,
) -> ClusterCloudModel {
    let Some(cloud) = cloud else {
        return ClusterCloudModel::default();
    };

    ClusterCloudModel {
        aws: cloud
            .aws
            .as_ref()
            .map(|aws| flatten_aws(aws, billing_tenant, preserved.aws.as_ref())),
        openstack: cloud
            .openstack
            .as_ref()
            .map(|os| flatten_openstack(os, preserved.openstack.as_ref())),
        azure: cloud
            .azure
            .as_ref()
            .map(|azure| flatten_azure(azure, preserved.azure.as_ref())),
    }
}

fn flatten_aws(
    aws: &AwsCloudSpec,
    billing_tenant: Option<&str>,
    prior: Option<&AwsCloudModel>,
) -> AwsCloudModel {
    AwsCloudModel {
        access_key_id: first_non_empty(&[
            Some(aws.access_key_id.as_str()),
            prior.map(|p| p.access_key_id.as_str()),
        ])
        .unwrap_or_default(),
        secret_access_key: first_non_empty(&[
            Some(aws.secret_access_key.as_str()),
            prior.map(|p| p.secret_access_key.as_str()),
        ])
        .unwrap_or_default(),
        vpc_id: non_empty(&aws.vpc_id),
        security_group_id: non_empty(&aws.security_group_id),
        route_table_id: non_empty(&aws.route_table_id),
        instance_profile_name: non_empty(&aws.instance_profile_name),
        role_arn: non_empty(&aws.role_arn),
        openstack_billing_tenant: first_non_empty(&[
            Some(aws.openstack_billing_tenant.as_str()),
            billing_tenant,
            prior.and_then(|p| p.openstack_billing_tenant.as_deref()),
        ]),
    }
}

fn flatten_openstack(
    os: &OpenstackCloudSpec,
    prior: Option<&OpenstackCloudModel>,
) -> OpenstackCloudModel {
    let prior_user = prior.and_then(|p| p.user_credentials.as_ref());
    let prior_app = prior.and_then(|p| p.application_credentials.as_ref());

    let username = first_non_empty(&[
        Some(os.username.as_str()),
        prior_user.map(|c| c.username.as_str()),
    ]);
    let password = first_non_empty(&[
        Some(os.password.as_str()),
        prior_user.map(|c| c.password.as_str()),
    ]);
    let project_id = first_non_empty(&[
        Some(os.project_id.as_str()),
        prior_user.map(|c| c.project_id.as_str()),
    ]);
    let project_name = first_non_empty(&[
        Some(os.project.as_str()),
        prior_user.and_then(|c| c.project_name.as_deref()),
    ]);
    let user_credentials = (username.is_some() || password.is_some() || project_id.is_some())
        .then(|| OpenstackUserCredentials {
            project_id: project_id.unwrap_or_default(),
            project_name,
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        });

    let app_id = first_non_empty(&[
        Some(os.application_credential_id.as_str()),
        prior_app.map(|c| c.id.as_str()),
    ]);
    let app_secret = first_non_empty(&[
        Some(os.application_credential_secret.as_str()),
        prior_app.map(|c| c.secret.as_str()),
    ]);
    let application_credentials =
        (app_id.is_some() || app_secret.is_some()).then(|| OpenstackApplicationCredentials {
            id: app_id.unwrap_or_default(),
            secret: app_secret.unwrap_or_default(),
        });

    OpenstackCloudModel {
        floating_ip_pool: non_empty(&os.floating_ip_pool),
        security_group: non_empty(&os.security_groups),
        network: non_empty(&os.network),
        subnet_id: non_empty(&os.subnet_id),
        server_group_id: first_non_empty(&[
            Some(os.server_group_id.as_str()),
            prior.and_then(|p| p.server_group_id.as_deref()),
        ]),
        user_credentials,
        application_credentials,
    }
}

fn flatten_azure(azure: &AzureCloudSpec, prior: Option<&AzureCloudModel>) -> AzureCloudModel {
    let keep = |server: &str, pick: fn(&AzureCloudModel) -> &str| {
        first_non_empty(&[Some(server), prior.map(pick)]).unwrap_or_default()
    };

    AzureCloudModel {
        client_id: keep(&azure.client_id, |p| p.client_id.as_str()),
        client_secret: keep(&azure.client_secret, |p| p.client_secret.as_str()),
        tenant_id: keep(&azure.tenant_id, |p| p.tenant_id.as_str()),
        subscription_id: keep(&azure.subscription_id, |p| p.subscription_id.as_str()),
        resource_group: non_empty(&azure.resource_group),
        route_table: non_empty(&azure.route_table),
        security_group: non_empty(&azure.security_group),
        subnet: non_empty(&azure.subnet),
        vnet: non_empty(&azure.vnet),
        availability_set: non_empty(&azure.availability_set),
    }
}

/// Builds a cluster specification, including only paths accepted by `changes`.
#[must_use]
pub fn expand_cluster_spec(model: &ClusterModel, changes: &ChangeSet) -> ClusterSpec {
    let spec = &model.spec;
    let mut out = ClusterSpec::default();

    if changes.includes("spec.version") {
        out.version = non_empty(&spec.version);
    }

    if changes.includes("spec.cloud") {
        out.cloud = Some(expand_cloud(&model.dc_name, &spec.cloud));
        out.billing_tenant = spec
            .cloud
            .aws
            .as_ref()
            .and_then(|aws| aws.openstack_billing_tenant.as_deref())
            .and_then(non_empty);
    }

    let network_changed = ["spec.ip_family", "spec.pods_cidr", "spec.services_cidr"]
        .iter()
        .any(|path| changes.includes(path));
    if network_changed {
        let ranges = |value: Option<&String>| {
            value
                .and_then(|v| split_cidrs(v).into_iter().next())
                .map(|cidr| NetworkRanges {
                    cidr_blocks: vec![cidr],
                })
        };
        out.cluster_network = Some(ClusterNetwork {
            ip_family: spec.ip_family.as_deref().and_then(non_empty),
            pods: ranges(spec.pods_cidr.as_ref()),
            services: ranges(spec.services_cidr.as_ref()),
        });
    }

    if changes.includes("spec.cni_plugin") {
        out.cni_plugin = spec.cni_plugin.as_ref().map(|cni| CniPlugin {
            plugin_type: cni.plugin_type.clone(),
            version: None,
        });
    }

    if changes.includes("spec.audit_logging") {
        out.audit_logging = spec
            .audit_logging
            .map(|enabled| AuditLogging { enabled });
    }
    if changes.includes("spec.pod_security_policy") {
        out.use_pod_security_policy_admission_plugin = spec.pod_security_policy;
    }
    if changes.includes("spec.pod_node_selector") {
        out.use_pod_node_selector_admission_plugin = spec.pod_node_selector;
    }
    if changes.includes("spec.enable_ssh_agent") {
        // Attached keys need the agent; unset means on.
        out.enable_user_ssh_key_agent = spec
            .enable_ssh_agent
            .or_else(|| (!model.sshkeys.is_empty()).then_some(true));
    }
    if changes.includes("spec.update_window") {
        out.update_window = spec.update_window.as_ref().map(|w| UpdateWindow {
            start: w.start.clone(),
            length: w.length.clone(),
        });
    }
    if changes.includes("spec.syseleven_auth") {
        out.syseleven_auth = spec.syseleven_auth.as_ref().map(|a| SysElevenAuth {
            realm: a.realm.as_deref().and_then(non_empty),
            iam_authentication: a.iam_authentication,
        });
    }

    out
}

fn expand_cloud(dc_name: &str, cloud: &ClusterCloudModel) -> CloudSpec {
    CloudSpec {
        datacenter_name: dc_name.to_string(),
        aws: cloud.aws.as_ref().map(|aws| AwsCloudSpec {
            access_key_id: aws.access_key_id.clone(),
            secret_access_key: aws.secret_access_key.clone(),
            vpc_id: aws.vpc_id.clone().unwrap_or_default(),
            security_group_id: aws.security_group_id.clone().unwrap_or_default(),
            route_table_id: aws.route_table_id.clone().unwrap_or_default(),
            instance_profile_name: aws.instance_profile_name.clone().unwrap_or_default(),
            role_arn: aws.role_arn.clone().unwrap_or_default(),
            openstack_billing_tenant: aws.openstack_billing_tenant.clone().unwrap_or_default(),
        }),
        openstack: cloud.openstack.as_ref().map(|os| {
            let user = os.user_credentials.as_ref();
            let app = os.application_credentials.as_ref();
            OpenstackCloudSpec {
                domain: OPENSTACK_DOMAIN.to_string(),
                floating_ip_pool: os.floating_ip_pool.clone().unwrap_or_default(),
                network: os.network.clone().unwrap_or_default(),
                subnet_id: os.subnet_id.clone().unwrap_or_default(),
                security_groups: os.security_group.clone().unwrap_or_default(),
                server_group_id: os.server_group_id.clone().unwrap_or_default(),
                username: user.map(|c| c.username.clone()).unwrap_or_default(),
                password: user.map(|c| c.password.clone()).unwrap_or_default(),
                project: user
                    .and_then(|c| c.project_name.clone())
                    .unwrap_or_default(),
                project_id: user.map(|c| c.project_id.clone()).unwrap_or_default(),
                application_credential_id: app.map(|c| c.id.clone()).unwrap_or_default(),
                application_credential_secret: app
                    .map(|c| c.secret.clone())
                    .unwrap_or_default(),
            }
        }),
        azure: cloud.azure.as_ref().map(|azure| AzureCloudSpec {
            client_id: azure.client_id.clone(),
            client_secret: azure.client_secret.clone(),
            tenant_id: azure.tenant_id.clone(),
            subscription_id: azure.subscription_id.clone(),
            resource_group: azure.resource_group.clone().unwrap_or_default(),
            route_table: azure.route_table.clone().unwrap_or_default(),
            security_group: azure.security_group.clone().unwrap_or_default(),
            subnet: azure.subnet.clone().unwrap_or_default(),
            vnet: azure.vnet.clone().unwrap_or_default(),
            availability_set: azure.availability_set.clone().unwrap_or_default(),
        }),
    }
}

/// Builds the create request for a model.
#[must_use]
pub fn expand_cluster(model: &ClusterModel) -> CreateClusterSpec {
    CreateClusterSpec {
        cluster: Cluster {
            name: model.name.clone(),
            labels: model.labels.clone(),
            spec: expand_cluster_spec(model, &ChangeSet::everything()),
            ..Cluster::default()
        },
    }
}

/// Builds the update patch: `name`, `labels` and `spec`, each only when changed.
#[must_use]
pub fn cluster_patch(prior: &ClusterModel, plan: &ClusterModel, changes: &ChangeSet) -> ClusterPatch {
    ClusterPatch {
        name: changes.includes("name").then(|| plan.name.clone()),
        labels: label_changes(&prior.labels, &plan.labels),
        spec: changes
            .includes("spec")
            .then(|| expand_cluster_spec(plan, changes))
            .filter(|spec| *spec != ClusterSpec::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ClusterStatus;
    use std::collections::BTreeMap;

    fn openstack_model() -> ClusterModel {
        ClusterModel {
            name: String::from("prod"),
            dc_name: String::from("dbl1"),
            spec: ClusterSpecModel {
                version: String::from("1.28.5"),
                pods_cidr: Some(String::from("172.25.0.0/16,10.0.0.0/16")),
                cni_plugin: Some(CniPluginModel {
                    plugin_type: String::from("cilium"),
                }),
                cloud: ClusterCloudModel {
                    openstack: Some(OpenstackCloudModel {
                        network: Some(String::from("net")),
                        user_credentials: Some(OpenstackUserCredentials {
                            project_id: String::from("pid"),
                            project_name: None,
                            username: String::from("u"),
                            password: String::from("p"),
                        }),
                        ..OpenstackCloudModel::default()
                    }),
                    ..ClusterCloudModel::default()
                },
                ..ClusterSpecModel::default()
            },
            ..ClusterModel::default()
        }
    }

    /// What the server sends back: no credentials, no domain.
    fn server_echo(model: &ClusterModel) -> Cluster {
        let mut cluster = expand_cluster(model).cluster;
        cluster.id = String::from("abc123");
        if let Some(os) = cluster.spec.cloud.as_mut().and_then(|c| c.openstack.as_mut()) {
            os.username.clear();
            os.password.clear();
            os.project_id.clear();
            os.domain.clear();
        }
        cluster
    }

    #[test]
    fn test_expand_openstack_sets_default_domain_and_first_cidr() {
        let body = expand_cluster(&openstack_model());
        let spec = &body.cluster.spec;
        let os = spec
            .cloud
            .as_ref()
            .and_then(|c| c.openstack.as_ref())
            .expect("openstack block");

        assert_eq!(os.domain, OPENSTACK_DOMAIN);
        assert_eq!(os.username, "u");
        assert_eq!(
            spec.cluster_network
                .as_ref()
                .and_then(|n| n.pods.as_ref())
                .map(|p| p.cidr_blocks.clone()),
            Some(vec![String::from("172.25.0.0/16")])
        );
    }

    #[test]
    fn test_credentials_survive_round_trip() {
        let model = openstack_model();
        let preserved = ClusterPreserved::from_model(&model);
        let mut diagnostics = Diagnostics::new();

        let flattened = flatten_cluster(&server_echo(&model), &preserved, &mut diagnostics);

        assert_eq!(flattened.spec.cloud, model.spec.cloud);
        assert_eq!(flattened.id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_multiple_cidr_plan_stays_in_place_after_create() {
        let plan = openstack_model();
        let mut diagnostics = Diagnostics::new();

        let state = flatten_cluster(
            &server_echo(&plan),
            &ClusterPreserved::from_model(&plan),
            &mut diagnostics,
        );

        assert_eq!(state.spec.pods_cidr, plan.spec.pods_cidr);
        assert!(
            crate::resources::ensure_in_place(&crate::schema::cluster::SCHEMA, &state, &plan)
                .is_ok()
        );

        let mut moved = plan.clone();
        moved.spec.pods_cidr = Some(String::from("172.26.0.0/16"));
        let state = flatten_cluster(
            &server_echo(&moved),
            &ClusterPreserved::from_model(&plan),
            &mut diagnostics,
        );
        assert_eq!(state.spec.pods_cidr.as_deref(), Some("172.26.0.0/16"));
    }

    #[test]
    fn test_sshkeys_turn_agent_on_when_unset() {
        let mut model = openstack_model();
        assert_eq!(expand_cluster(&model).cluster.spec.enable_user_ssh_key_agent, None);

        model.sshkeys.insert(String::from("key-1"));
        assert_eq!(
            expand_cluster(&model).cluster.spec.enable_user_ssh_key_agent,
            Some(true)
        );
    }

    #[test]
    fn test_cni_none_and_absent_normalize_to_canal() {
        assert_eq!(normalize_cni(None), "canal");
        let none = CniPlugin {
            plugin_type: String::from("none"),
            version: None,
        };
        assert_eq!(normalize_cni(Some(&none)), "canal");
        let cilium = CniPlugin {
            plugin_type: String::from("cilium"),
            version: Some(String::from("1.14")),
        };
        assert_eq!(normalize_cni(Some(&cilium)), "cilium");
    }

    #[test]
    fn test_flatten_hides_system_labels_and_warns_on_multiple_cidrs() {
        let mut labels = BTreeMap::new();
        labels.insert(String::from("team"), String::from("a"));
        labels.insert(String::from("system-project"), String::from("p"));
        let cluster = Cluster {
            id: String::from("c1"),
            name: String::from("prod"),
            labels,
            spec: ClusterSpec {
                cluster_network: Some(ClusterNetwork {
                    ip_family: Some(String::from("IPv4")),
                    pods: Some(NetworkRanges {
                        cidr_blocks: vec![String::from("172.25.0.0/16"), String::from("fd00::/104")],
                    }),
                    services: None,
                }),
                ..ClusterSpec::default()
            },
            status: Some(ClusterStatus {
                version: String::from("1.28.5"),
                url: String::new(),
            }),
            ..Cluster::default()
        };

        let mut diagnostics = Diagnostics::new();
        let model = flatten_cluster(&cluster, &ClusterPreserved::default(), &mut diagnostics);

        assert_eq!(model.labels.len(), 1);
        assert!(model.labels.contains_key("team"));
        assert_eq!(model.spec.pods_cidr.as_deref(), Some("172.25.0.0/16"));
        assert_eq!(model.spec.version, "1.28.5");
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_aws_billing_tenant_is_mirrored() {
        let mut model = openstack_model();
        model.spec.cloud = ClusterCloudModel {
            aws: Some(AwsCloudModel {
                access_key_id: String::from("AKIA"),
                secret_access_key: String::from("s"),
                openstack_billing_tenant: Some(String::from("tenant-1")),
                ..AwsCloudModel::default()
            }),
            ..ClusterCloudModel::default()
        };

        let spec = expand_cluster(&model).cluster.spec;
        assert_eq!(spec.billing_tenant.as_deref(), Some("tenant-1"));
    }

    #[test]
    fn test_patch_contains_only_label_removal() {
        let mut prior = openstack_model();
        prior.labels.insert(String::from("a"), String::from("b"));
        prior.labels.insert(String::from("c"), String::from("d"));
        let mut plan = prior.clone();
        plan.labels.remove("c");

        let changes = ChangeSet::between(&prior, &plan).expect("diff");
        let patch = cluster_patch(&prior, &plan, &changes);

        let body = serde_json::to_value(&patch).expect("serialize");
        assert_eq!(body, serde_json::json!({"labels": {"c": null}}));
    }

    #[test]
    fn test_patch_version_only() {
        let prior = openstack_model();
        let mut plan = prior.clone();
        plan.spec.version = String::from("1.29.1");

        let changes = ChangeSet::between(&prior, &plan).expect("diff");
        let body = serde_json::to_value(cluster_patch(&prior, &plan, &changes)).expect("serialize");
        assert_eq!(body, serde_json::json!({"spec": {"version": "1.29.1"}}));
    }
}
