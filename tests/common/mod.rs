//! Shared fixtures for the HTTP-level reconciler tests.

#![allow(dead_code)]

use std::time::Duration;

use metakube_provider::api::MetaKubeClient;
use metakube_provider::retry::PollSettings;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const PROJECT: &str = "proj-42";
pub const CLUSTER: &str = "abc123";
pub const DATACENTER: &str = "dbl1";

/// Client pointed at the mock server.
pub fn client(server: &MockServer) -> MetaKubeClient {
    MetaKubeClient::new(&server.uri(), "test-token", "test", Duration::from_secs(5))
        .expect("client should build")
}

/// Poll cadence short enough for tests.
pub fn fast_poll() -> PollSettings {
    PollSettings::uniform(Duration::from_millis(10))
}

pub fn cluster_path(suffix: &str) -> String {
    format!("/api/v2/projects/{PROJECT}/clusters/{CLUSTER}{suffix}")
}

/// Error envelope the API answers with.
pub fn api_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"code": status, "message": message}
    }))
}

pub async fn mount_json(server: &MockServer, verb: &str, route: &str, body: Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, verb: &str, route: &str, status: u16) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Requests received for `verb route`, in arrival order.
pub async fn requests(server: &MockServer, verb: &str, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == route)
        .collect()
}

pub fn healthy() -> Value {
    json!({
        "apiserver": 1,
        "cloudProviderInfrastructure": 1,
        "controller": 1,
        "etcd": 1,
        "machineController": 1,
        "scheduler": 1,
        "userClusterControllerManager": 1
    })
}

/// An OpenStack cluster as the API returns it: no credentials echoed.
pub fn openstack_cluster(version: &str) -> Value {
    json!({
        "id": CLUSTER,
        "name": "demo",
        "creationTimestamp": "2024-05-02T10:00:00Z",
        "labels": {"team": "core", "system-project": PROJECT},
        "spec": {
            "version": version,
            "cloud": {
                "dc": DATACENTER,
                "openstack": {"floatingIpPool": "ext-net"}
            },
            "cniPlugin": {"type": "canal", "version": "v3.26"}
        },
        "status": {"version": version, "url": "https://abc123.example:6443"}
    })
}

/// Mounts everything a healthy, settled cluster answers.
pub async fn mount_ready_cluster(server: &MockServer, cluster: Value) {
    mount_json(server, "GET", &cluster_path(""), cluster).await;
    mount_json(server, "GET", &cluster_path("/health"), healthy()).await;
    mount_json(server, "GET", &cluster_path("/sshkeys"), json!([])).await;
    Mock::given(method("GET"))
        .and(path(cluster_path("/kubeconfig")))
        .respond_with(ResponseTemplate::new(200).set_body_string("apiVersion: v1\nkind: Config\n"))
        .mount(server)
        .await;
}

/// Mounts the catalogue lookups of cluster validation.
pub async fn mount_openstack_catalogue(server: &MockServer, versions: &[&str]) {
    let versions: Vec<Value> = versions.iter().map(|v| json!({"version": v})).collect();
    mount_json(server, "GET", "/api/v1/versions", Value::Array(versions)).await;
    mount_json(
        server,
        "GET",
        "/api/v2/datacenters",
        json!([
            {"metadata": {"name": DATACENTER}, "spec": {"provider": "openstack", "openstack": {}}},
            {"metadata": {"name": "aws-eu-central-1a"}, "spec": {"provider": "aws", "aws": {}}}
        ]),
    )
    .await;
    mount_json(
        server,
        "GET",
        "/api/v1/providers/openstack/networks",
        json!([
            {"id": "net-ext", "name": "ext-net", "external": true},
            {"id": "net-int", "name": "demo-net", "external": false}
        ]),
    )
    .await;
}
