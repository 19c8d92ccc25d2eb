//! Cluster validation.

use chrono::NaiveTime;
use tracing::debug;

use crate::api::types::{OpenstackCredentials, OpenstackNetwork};
use crate::api::MetaKubeClient;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::schema::cluster::{
    CNI_PLUGINS, CloudProvider, ClusterModel, IP_FAMILIES, OpenstackCloudModel,
    OpenstackUserCredentials, UpdateWindowModel,
};
use crate::schema::timeouts::parse_duration;
use crate::translate::cluster::OPENSTACK_DOMAIN;

use super::{
    available, check_cidrs, check_labels, check_one_of, check_semver, check_timeouts,
    same_version,
};

const WEEKDAYS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Checks a cluster model without contacting the API.
#[must_use]
pub fn validate_cluster_local(model: &ClusterModel) -> Diagnostics {
    let mut out = Diagnostics::new();
    let spec = &model.spec;

    check_labels("labels", &model.labels, &mut out);
    check_timeouts(model.timeouts.as_ref(), &mut out);
    check_semver("spec.version", &spec.version, &mut out);

    if !model.sshkeys.is_empty() && spec.enable_ssh_agent == Some(false) {
        out.error_at(
            "spec.enable_ssh_agent",
            "SSH agent disabled",
            "sshkeys can only be assigned when enable_ssh_agent is true.",
        );
    }

    if let Some(window) = &spec.update_window {
        check_update_window(window, &mut out);
    }
    if let Some(family) = &spec.ip_family {
        check_one_of("spec.ip_family", family, IP_FAMILIES, &mut out);
    }
    if let Some(cni) = &spec.cni_plugin {
        check_one_of("spec.cni_plugin.type", &cni.plugin_type, CNI_PLUGINS, &mut out);
    }
    if let Some(cidr) = &spec.pods_cidr {
        check_cidrs("spec.pods_cidr", cidr, &mut out);
    }
    if let Some(cidr) = &spec.services_cidr {
        check_cidrs("spec.services_cidr", cidr, &mut out);
    }

    let providers = spec.cloud.providers();
    if providers.len() != 1 {
        let found: Vec<&str> = providers.iter().map(|p| p.as_str()).collect();
        out.error_at(
            "spec.cloud",
            "Exactly one cloud provider block is required",
            if found.is_empty() {
                String::from("None of aws, openstack or azure is set.")
            } else {
                format!("Found: {}", found.join(", "))
            },
        );
    }

    if let Some(openstack) = &spec.cloud.openstack {
        check_openstack_credentials(openstack, &mut out);
    }

    out
}

fn check_update_window(window: &UpdateWindowModel, out: &mut Diagnostics) {
    if let Err(e) = parse_duration(&window.length) {
        out.error_at("spec.update_window.length", "Invalid duration", e);
    }

    let parts: Vec<&str> = window.start.split_whitespace().collect();
    let (day, time) = match parts.as_slice() {
        [time] => (None, *time),
        [day, time] => (Some(*day), *time),
        _ => (Some(""), ""),
    };
    let day_ok = day.is_none_or(|day| WEEKDAYS.contains(&day));
    let time_ok = NaiveTime::parse_from_str(time, "%H:%M").is_ok();
    if !day_ok || !time_ok {
        out.error_at(
            "spec.update_window.start",
            "Invalid update window start",
            format!(
                "\"{}\" must look like \"Tue 02:00\" or \"02:00\".",
                window.start
            ),
        );
    }
}

fn user_credentials_complete(creds: &OpenstackUserCredentials) -> bool {
    !creds.username.is_empty() && !creds.password.is_empty() && !creds.project_id.is_empty()
}

fn check_openstack_credentials(openstack: &OpenstackCloudModel, out: &mut Diagnostics) {
    const ATTR: &str = "spec.cloud.openstack";

    match (&openstack.user_credentials, &openstack.application_credentials) {
        (Some(_), Some(_)) => out.error_at(
            ATTR,
            "Conflicting OpenStack credentials",
            "Only one of user_credentials and application_credentials can be set.",
        ),
        (None, None) => out.error_at(
            ATTR,
            "Missing OpenStack credentials",
            "Either user_credentials or application_credentials must be set.",
        ),
        _ => {}
    }

    if let Some(creds) = &openstack.user_credentials {
        let any_set = !creds.username.is_empty()
            || !creds.password.is_empty()
            || !creds.project_id.is_empty()
            || creds.project_name.as_deref().is_some_and(|n| !n.is_empty());
        if any_set && !user_credentials_complete(creds) {
            out.error_at(
                format!("{ATTR}.user_credentials"),
                "Incomplete OpenStack user credentials",
                "username, password and project_id must all be set (or provided through OS_USERNAME, OS_PASSWORD and OS_PROJECT_ID).",
            );
        }
    }

    if let Some(creds) = &openstack.application_credentials {
        if creds.id.is_empty() != creds.secret.is_empty() {
            out.error_at(
                format!("{ATTR}.application_credentials"),
                "Incomplete OpenStack application credentials",
                "id and secret must both be set (or provided through OS_APPLICATION_CREDENTIAL_ID and OS_APPLICATION_CREDENTIAL_SECRET).",
            );
        }
    }
}

/// Builds lookup credentials when the OpenStack block is fully authenticated.
#[must_use]
pub fn openstack_credentials(dc_name: &str, openstack: &OpenstackCloudModel) -> Option<OpenstackCredentials> {
    let base = OpenstackCredentials {
        datacenter: dc_name.to_string(),
        domain: OPENSTACK_DOMAIN.to_string(),
        ..OpenstackCredentials::default()
    };

    if let Some(creds) = openstack
        .user_credentials
        .as_ref()
        .filter(|c| user_credentials_complete(c))
    {
        return Some(OpenstackCredentials {
            username: creds.username.clone(),
            password: creds.password.clone(),
            project_id: creds.project_id.clone(),
            project: creds.project_name.clone().unwrap_or_default(),
            ..base
        });
    }

    openstack
        .application_credentials
        .as_ref()
        .filter(|c| !c.id.is_empty() && !c.secret.is_empty())
        .map(|creds| OpenstackCredentials {
            application_credential_id: creds.id.clone(),
            application_credential_secret: creds.secret.clone(),
            ..base
        })
}

/// Server-side cluster checks.
#[derive(Debug, Clone, Copy)]
pub struct ClusterValidator<'a> {
    client: &'a MetaKubeClient,
}

impl<'a> ClusterValidator<'a> {
    /// Creates a validator backed by `client`.
    #[must_use]
    pub const fn new(client: &'a MetaKubeClient) -> Self {
        Self { client }
    }

    /// Checks a model before Create.
    ///
    /// Server-side checks are skipped when the local checks already failed.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalogue lookup fails.
    pub async fn validate_create(&self, model: &ClusterModel) -> Result<Diagnostics> {
        let mut out = validate_cluster_local(model);
        if out.has_errors() {
            return Ok(out);
        }

        out.extend(self.version_exists(&model.spec.version).await?);
        out.extend(self.common(model).await?);
        Ok(out)
    }

    /// Checks a plan before Update.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalogue lookup fails.
    pub async fn validate_update(
        &self,
        project: &str,
        cluster_id: &str,
        prior: &ClusterModel,
        plan: &ClusterModel,
    ) -> Result<Diagnostics> {
        let mut out = validate_cluster_local(plan);
        if out.has_errors() {
            return Ok(out);
        }

        if !same_version(&prior.spec.version, &plan.spec.version) {
            out.extend(
                self.upgrade_allowed(project, cluster_id, &plan.spec.version)
                    .await?,
            );
        }
        out.extend(self.common(plan).await?);
        Ok(out)
    }

    async fn common(&self, model: &ClusterModel) -> Result<Diagnostics> {
        let mut out = Diagnostics::new();
        if let Some(provider) = model.spec.cloud.provider() {
            out.extend(self.datacenter_matches(&model.dc_name, provider).await?);
        }
        if let Some(openstack) = &model.spec.cloud.openstack {
            out.extend(self.openstack_reachable(&model.dc_name, openstack).await?);
        }
        Ok(out)
    }

    /// The requested version must be offered by the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the version list cannot be fetched.
    pub async fn version_exists(&self, version: &str) -> Result<Diagnostics> {
        let versions = self.client.master_versions().await?;
        let mut out = Diagnostics::new();

        if !versions.iter().any(|v| same_version(&v.version, version)) {
            let names: Vec<String> = versions.into_iter().map(|v| v.version).collect();
            out.error_at(
                "spec.version",
                format!("Unknown version {version}"),
                available("versions", &names),
            );
        }
        Ok(out)
    }

    /// The new version must be in the cluster's upgrade list.
    ///
    /// # Errors
    ///
    /// Returns an error if the upgrade list cannot be fetched.
    pub async fn upgrade_allowed(
        &self,
        project: &str,
        cluster_id: &str,
        version: &str,
    ) -> Result<Diagnostics> {
        let upgrades = self.client.cluster_upgrades(project, cluster_id).await?;
        let mut out = Diagnostics::new();

        if !upgrades.iter().any(|v| same_version(&v.version, version)) {
            let names: Vec<String> = upgrades.into_iter().map(|v| v.version).collect();
            out.error_at(
                "spec.version",
                format!("Cannot upgrade to version {version}"),
                available("upgrades", &names),
            );
        }
        Ok(out)
    }

    /// The datacenter must exist and serve `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the datacenter list cannot be fetched.
    pub async fn datacenter_matches(
        &self,
        dc_name: &str,
        provider: CloudProvider,
    ) -> Result<Diagnostics> {
        let datacenters = self.client.list_datacenters().await?;
        let mut out = Diagnostics::new();

        let Some(dc) = datacenters.iter().find(|dc| dc.metadata.name == dc_name) else {
            let names: Vec<String> = datacenters.into_iter().map(|dc| dc.metadata.name).collect();
            out.error_at(
                "dc_name",
                format!("Unknown datacenter {dc_name}"),
                available("datacenters", &names),
            );
            return Ok(out);
        };

        let serves = match provider {
            CloudProvider::Aws => dc.spec.aws.is_some(),
            CloudProvider::Openstack => dc.spec.openstack.is_some(),
            CloudProvider::Azure => dc.spec.azure.is_some(),
        } || dc.spec.provider == provider.as_str();

        if !serves {
            let names: Vec<String> = datacenters
                .iter()
                .filter(|dc| match provider {
                    CloudProvider::Aws => dc.spec.aws.is_some(),
                    CloudProvider::Openstack => dc.spec.openstack.is_some(),
                    CloudProvider::Azure => dc.spec.azure.is_some(),
                })
                .map(|dc| dc.metadata.name.clone())
                .collect();
            out.error_at(
                format!("spec.cloud.{provider}"),
                format!("Datacenter {dc_name} is not a {provider} datacenter"),
                available(&format!("{provider} datacenters"), &names),
            );
        }
        Ok(out)
    }

    /// Floating IP pool, network and subnet must exist.
    ///
    /// Skipped when the credentials are not complete.
    ///
    /// # Errors
    ///
    /// Returns an error if an OpenStack lookup fails.
    pub async fn openstack_reachable(
        &self,
        dc_name: &str,
        openstack: &OpenstackCloudModel,
    ) -> Result<Diagnostics> {
        let mut out = Diagnostics::new();
        let Some(credentials) = openstack_credentials(dc_name, openstack) else {
            debug!("OpenStack credentials incomplete, skipping network lookups");
            return Ok(out);
        };

        let pool = openstack.floating_ip_pool.as_deref().filter(|s| !s.is_empty());
        let network = openstack.network.as_deref().filter(|s| !s.is_empty());
        let subnet = openstack.subnet_id.as_deref().filter(|s| !s.is_empty());
        if pool.is_none() && network.is_none() {
            return Ok(out);
        }

        let networks = self.client.openstack_networks(&credentials).await?;
        let (external, internal): (Vec<&OpenstackNetwork>, Vec<&OpenstackNetwork>) =
            networks.iter().partition(|n| n.external);

        if let Some(pool) = pool {
            if !external.iter().any(|n| n.name == pool) {
                let names: Vec<String> = external.iter().map(|n| n.name.clone()).collect();
                out.error_at(
                    "spec.cloud.openstack.floating_ip_pool",
                    format!("Unknown floating IP pool {pool}"),
                    available("floating IP pools", &names),
                );
            }
        }

        let Some(network) = network else {
            return Ok(out);
        };
        let Some(found) = internal.iter().find(|n| n.name == network) else {
            let names: Vec<String> = internal.iter().map(|n| n.name.clone()).collect();
            out.error_at(
                "spec.cloud.openstack.network",
                format!("Unknown network {network}"),
                available("networks", &names),
            );
            return Ok(out);
        };

        if let Some(subnet) = subnet {
            let subnets = self.client.openstack_subnets(&credentials, &found.id).await?;
            if !subnets.iter().any(|s| s.id == subnet) {
                let pairs: Vec<String> = subnets
                    .iter()
                    .map(|s| format!("{} ({})", s.name, s.id))
                    .collect();
                out.error_at(
                    "spec.cloud.openstack.subnet_id",
                    format!("Subnet {subnet} not found in network {network}"),
                    available("subnets", &pairs),
                );
            }
        }
        Ok(out)
    }
}
