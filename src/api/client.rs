//! MetaKube API client implementation.
//!
//! One typed method per endpoint. Every request carries the bearer token and
//! the `Orchestrator/<version>` user agent; non-success responses become
//! [`ApiError`]s carrying the status and the server's error payload.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{ApiError, ConfigError, MetaKubeError, Result};

use super::types::{
    Cluster, ClusterHealth, ClusterPatch, ClusterRoleBinding, CreateClusterSpec, Datacenter,
    MasterVersion, Node, NodeDeployment, NodeDeploymentPatch, OpenstackCredentials,
    OpenstackNetwork, OpenstackSubnet, Project, RoleBinding, RoleUser, SshKey,
};

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// MetaKube API client.
///
/// Cheap to clone and shared by reference across operations; it carries no
/// per-request state.
#[derive(Debug, Clone)]
pub struct MetaKubeClient {
    /// HTTP client with authentication headers installed.
    http: Client,
    /// API base URL without trailing slash.
    base_url: String,
    /// Timeout applied to each request.
    request_timeout: Duration,
}

impl MetaKubeClient {
    /// Creates a new client.
    ///
    /// `host_version` is the orchestrator version reported in the user agent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the host is not an http(s) URL or the
    /// token contains characters not allowed in a header.
    pub fn new(host: &str, token: &str, host_version: &str, request_timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(host)
            .map_err(|e| ConfigError::validation(format!("invalid host {host:?}: {e}"), "host"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::validation(
                format!("host must use http or https, got {:?}", url.scheme()),
                "host",
            )
            .into());
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ConfigError::validation("token contains invalid characters", "token"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(format!("Orchestrator/{host_version}"))
            .build()
            .map_err(|e| MetaKubeError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: host.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{method} {path}");
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .timeout(self.request_timeout)
    }

    /// Sends a request and maps non-success statuses to [`ApiError`].
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|source| MetaKubeError::Transport {
                operation: operation.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        trace!("{operation} failed with {status}: {body}");
        Err(ApiError::from_response(operation, status.as_u16(), body).into())
    }

    async fn fetch_text(&self, operation: &str, request: RequestBuilder) -> Result<String> {
        let response = self.send(operation, request).await?;
        response
            .text()
            .await
            .map_err(|source| MetaKubeError::Transport {
                operation: operation.to_string(),
                source,
            })
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let body = self.fetch_text(operation, request).await?;
        trace!("{operation} response: {body}");
        serde_json::from_str(&body).map_err(|e| MetaKubeError::InvalidResponse {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_empty(&self, operation: &str, request: RequestBuilder) -> Result<()> {
        self.send(operation, request).await.map(|_| ())
    }

    // Projects

    /// Lists the projects visible to the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.fetch_json("list projects", self.request(Method::GET, "/api/v1/projects"))
            .await
    }

    // Clusters

    /// Lists the clusters of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_clusters(&self, project: &str) -> Result<Vec<Cluster>> {
        let path = format!("/api/v2/projects/{project}/clusters");
        self.fetch_json("list clusters", self.request(Method::GET, &path))
            .await
    }

    /// Gets a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_cluster(&self, project: &str, cluster: &str) -> Result<Cluster> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}");
        self.fetch_json("get cluster", self.request(Method::GET, &path))
            .await
    }

    /// Creates a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_cluster(&self, project: &str, body: &CreateClusterSpec) -> Result<Cluster> {
        let path = format!("/api/v2/projects/{project}/clusters");
        self.fetch_json("create cluster", self.request(Method::POST, &path).json(body))
            .await
    }

    /// Applies a merge patch to a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn patch_cluster(
        &self,
        project: &str,
        cluster: &str,
        patch: &ClusterPatch,
    ) -> Result<Cluster> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}");
        self.fetch_json("patch cluster", self.request(Method::PATCH, &path).json(patch))
            .await
    }

    /// Requests deletion of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_cluster(&self, project: &str, cluster: &str) -> Result<()> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}");
        self.fetch_empty("delete cluster", self.request(Method::DELETE, &path))
            .await
    }

    /// Gets control-plane component health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn cluster_health(&self, project: &str, cluster: &str) -> Result<ClusterHealth> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/health");
        self.fetch_json("get cluster health", self.request(Method::GET, &path))
            .await
    }

    /// Fetches the standard kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn kubeconfig(&self, project: &str, cluster: &str) -> Result<String> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/kubeconfig");
        self.fetch_text("get kubeconfig", self.request(Method::GET, &path))
            .await
    }

    /// Fetches the OIDC kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn oidc_kubeconfig(&self, project: &str, cluster: &str) -> Result<String> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/oidckubeconfig");
        self.fetch_text("get oidc kubeconfig", self.request(Method::GET, &path))
            .await
    }

    /// Fetches the kubelogin kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn kubelogin_kubeconfig(&self, project: &str, cluster: &str) -> Result<String> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/kubeloginkubeconfig");
        self.fetch_text("get kubelogin kubeconfig", self.request(Method::GET, &path))
            .await
    }

    /// Lists the SSH keys assigned to a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_cluster_sshkeys(&self, project: &str, cluster: &str) -> Result<Vec<SshKey>> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/sshkeys");
        self.fetch_json("list cluster sshkeys", self.request(Method::GET, &path))
            .await
    }

    /// Assigns a project SSH key to a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn assign_sshkey(&self, project: &str, cluster: &str, key: &str) -> Result<()> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/sshkeys/{key}");
        self.fetch_empty("assign sshkey", self.request(Method::PUT, &path))
            .await
    }

    /// Detaches an SSH key from a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn detach_sshkey(&self, project: &str, cluster: &str, key: &str) -> Result<()> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/sshkeys/{key}");
        self.fetch_empty("detach sshkey", self.request(Method::DELETE, &path))
            .await
    }

    /// Lists the control-plane versions a cluster may upgrade to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn cluster_upgrades(&self, project: &str, cluster: &str) -> Result<Vec<MasterVersion>> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/upgrades");
        self.fetch_json("list cluster upgrades", self.request(Method::GET, &path))
            .await
    }

    // Platform catalogue

    /// Lists the control-plane versions offered by the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn master_versions(&self) -> Result<Vec<MasterVersion>> {
        self.fetch_json("list versions", self.request(Method::GET, "/api/v1/versions"))
            .await
    }

    /// Lists the kubelet versions allowed for a control-plane version.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn node_upgrades(&self, control_plane_version: &str) -> Result<Vec<MasterVersion>> {
        let request = self
            .request(Method::GET, "/api/v1/upgrades/node")
            .query(&[("control_plane_version", control_plane_version)]);
        self.fetch_json("list node upgrades", request).await
    }

    /// Lists the datacenters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_datacenters(&self) -> Result<Vec<Datacenter>> {
        self.fetch_json("list datacenters", self.request(Method::GET, "/api/v2/datacenters"))
            .await
    }

    fn with_openstack_credentials(
        request: RequestBuilder,
        credentials: &OpenstackCredentials,
    ) -> RequestBuilder {
        [
            ("DatacenterName", &credentials.datacenter),
            ("Domain", &credentials.domain),
            ("Username", &credentials.username),
            ("Password", &credentials.password),
            ("Project", &credentials.project),
            ("ProjectID", &credentials.project_id),
            ("ApplicationCredentialID", &credentials.application_credential_id),
            ("ApplicationCredentialSecret", &credentials.application_credential_secret),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .fold(request, |request, (name, value)| request.header(name, value.as_str()))
    }

    /// Lists the OpenStack networks reachable with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn openstack_networks(
        &self,
        credentials: &OpenstackCredentials,
    ) -> Result<Vec<OpenstackNetwork>> {
        let request = Self::with_openstack_credentials(
            self.request(Method::GET, "/api/v1/providers/openstack/networks"),
            credentials,
        );
        self.fetch_json("list openstack networks", request).await
    }

    /// Lists the subnets of an OpenStack network.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn openstack_subnets(
        &self,
        credentials: &OpenstackCredentials,
        network_id: &str,
    ) -> Result<Vec<OpenstackSubnet>> {
        let request = Self::with_openstack_credentials(
            self.request(Method::GET, "/api/v1/providers/openstack/subnets")
                .query(&[("network_id", network_id)]),
            credentials,
        );
        self.fetch_json("list openstack subnets", request).await
    }

    // Node deployments

    /// Lists the node deployments of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_node_deployments(
        &self,
        project: &str,
        cluster: &str,
    ) -> Result<Vec<NodeDeployment>> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/machinedeployments");
        self.fetch_json("list node deployments", self.request(Method::GET, &path))
            .await
    }

    /// Gets a node deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_node_deployment(
        &self,
        project: &str,
        cluster: &str,
        id: &str,
    ) -> Result<NodeDeployment> {
        let path =
            format!("/api/v2/projects/{project}/clusters/{cluster}/machinedeployments/{id}");
        self.fetch_json("get node deployment", self.request(Method::GET, &path))
            .await
    }

    /// Creates a node deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_node_deployment(
        &self,
        project: &str,
        cluster: &str,
        body: &NodeDeployment,
    ) -> Result<NodeDeployment> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/machinedeployments");
        self.fetch_json(
            "create node deployment",
            self.request(Method::POST, &path).json(body),
        )
        .await
    }

    /// Replaces the specification of a node deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn patch_node_deployment(
        &self,
        project: &str,
        cluster: &str,
        id: &str,
        patch: &NodeDeploymentPatch,
    ) -> Result<NodeDeployment> {
        let path =
            format!("/api/v2/projects/{project}/clusters/{cluster}/machinedeployments/{id}");
        self.fetch_json(
            "patch node deployment",
            self.request(Method::PATCH, &path).json(patch),
        )
        .await
    }

    /// Applies a raw merge patch to a node deployment.
    ///
    /// Used for label removals, which need explicit `null` values.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn patch_node_deployment_raw(
        &self,
        project: &str,
        cluster: &str,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<NodeDeployment> {
        let path =
            format!("/api/v2/projects/{project}/clusters/{cluster}/machinedeployments/{id}");
        self.fetch_json(
            "patch node deployment labels",
            self.request(Method::PATCH, &path).json(patch),
        )
        .await
    }

    /// Deletes a node deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_node_deployment(&self, project: &str, cluster: &str, id: &str) -> Result<()> {
        let path =
            format!("/api/v2/projects/{project}/clusters/{cluster}/machinedeployments/{id}");
        self.fetch_empty("delete node deployment", self.request(Method::DELETE, &path))
            .await
    }

    /// Lists the nodes of a node deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_node_deployment_nodes(
        &self,
        project: &str,
        cluster: &str,
        id: &str,
    ) -> Result<Vec<Node>> {
        let path = format!(
            "/api/v2/projects/{project}/clusters/{cluster}/machinedeployments/{id}/nodes"
        );
        self.fetch_json("list node deployment nodes", self.request(Method::GET, &path))
            .await
    }

    // Project SSH keys

    /// Lists the SSH keys of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_sshkeys(&self, project: &str) -> Result<Vec<SshKey>> {
        let path = format!("/api/v1/projects/{project}/sshkeys");
        self.fetch_json("list sshkeys", self.request(Method::GET, &path))
            .await
    }

    /// Creates a project SSH key.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_sshkey(&self, project: &str, key: &SshKey) -> Result<SshKey> {
        let path = format!("/api/v1/projects/{project}/sshkeys");
        self.fetch_json("create sshkey", self.request(Method::POST, &path).json(key))
            .await
    }

    /// Deletes a project SSH key.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_sshkey(&self, project: &str, key: &str) -> Result<()> {
        let path = format!("/api/v1/projects/{project}/sshkeys/{key}");
        self.fetch_empty("delete sshkey", self.request(Method::DELETE, &path))
            .await
    }

    // Bindings

    /// Lists the namespaced role bindings of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_role_bindings(&self, project: &str, cluster: &str) -> Result<Vec<RoleBinding>> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/bindings");
        self.fetch_json("list role bindings", self.request(Method::GET, &path))
            .await
    }

    /// Binds a subject to a namespaced role.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn bind_role(
        &self,
        project: &str,
        cluster: &str,
        namespace: &str,
        role: &str,
        subject: &RoleUser,
    ) -> Result<()> {
        let path = format!(
            "/api/v2/projects/{project}/clusters/{cluster}/roles/{namespace}/{role}/bindings"
        );
        self.fetch_empty("bind role", self.request(Method::POST, &path).json(subject))
            .await
    }

    /// Unbinds a subject from a namespaced role.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn unbind_role(
        &self,
        project: &str,
        cluster: &str,
        namespace: &str,
        role: &str,
        subject: &RoleUser,
    ) -> Result<()> {
        let path = format!(
            "/api/v2/projects/{project}/clusters/{cluster}/roles/{namespace}/{role}/bindings"
        );
        self.fetch_empty("unbind role", self.request(Method::DELETE, &path).json(subject))
            .await
    }

    /// Lists the cluster role bindings of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_cluster_role_bindings(
        &self,
        project: &str,
        cluster: &str,
    ) -> Result<Vec<ClusterRoleBinding>> {
        let path = format!("/api/v2/projects/{project}/clusters/{cluster}/clusterbindings");
        self.fetch_json("list cluster role bindings", self.request(Method::GET, &path))
            .await
    }

    /// Binds a subject to a cluster role.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn bind_cluster_role(
        &self,
        project: &str,
        cluster: &str,
        role: &str,
        subject: &RoleUser,
    ) -> Result<()> {
        let path = format!(
            "/api/v2/projects/{project}/clusters/{cluster}/clusterroles/{role}/clusterbindings"
        );
        self.fetch_empty("bind cluster role", self.request(Method::POST, &path).json(subject))
            .await
    }

    /// Unbinds a subject from a cluster role.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn unbind_cluster_role(
        &self,
        project: &str,
        cluster: &str,
        role: &str,
        subject: &RoleUser,
    ) -> Result<()> {
        let path = format!(
            "/api/v2/projects/{project}/clusters/{cluster}/clusterroles/{role}/clusterbindings"
        );
        self.fetch_empty(
            "unbind cluster role",
            self.request(Method::DELETE, &path).json(subject),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_non_http_host() {
        let err = MetaKubeClient::new("ftp://example.com", "t", "1.0", Duration::from_secs(1))
            .expect_err("should fail");
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = MetaKubeClient::new("https://metakube.example/", "t", "1.0", Duration::from_secs(1))
            .expect("client should build");
        assert_eq!(client.base_url(), "https://metakube.example");
    }
}
