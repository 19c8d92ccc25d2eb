//! Cluster reconciler against a mocked MetaKube API.

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use common::{
    CLUSTER, DATACENTER, PROJECT, api_error, client, cluster_path, fast_poll, mount_json,
    mount_openstack_catalogue, mount_ready_cluster, mount_status, openstack_cluster, requests,
};
use metakube_provider::context::OperationContext;
use metakube_provider::error::MetaKubeError;
use metakube_provider::resources::{ClusterResource, Resource};
use metakube_provider::schema::ClusterModel;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openstack_plan() -> ClusterModel {
    serde_json::from_value(json!({
        "name": "demo",
        "project_id": PROJECT,
        "dc_name": DATACENTER,
        "labels": {"team": "core"},
        "spec": {
            "version": "1.28.5",
            "cloud": {
                "openstack": {
                    "floating_ip_pool": "ext-net",
                    "application_credentials": {"id": "app-id", "secret": "app-secret"}
                }
            }
        }
    }))
    .expect("valid cluster model")
}

fn user_credentials_state() -> ClusterModel {
    serde_json::from_value(json!({
        "id": CLUSTER,
        "project_id": PROJECT,
        "name": "demo",
        "dc_name": DATACENTER,
        "labels": {"team": "core"},
        "spec": {
            "version": "1.28.5",
            "cni_plugin": {"type": "canal"},
            "cloud": {
                "openstack": {
                    "floating_ip_pool": "ext-net",
                    "user_credentials": {"username": "u", "password": "p", "project_id": "pid"}
                }
            }
        }
    }))
    .expect("valid cluster state")
}

fn resource(server: &MockServer) -> ClusterResource {
    ClusterResource::new(client(server)).with_poll_settings(fast_poll())
}

#[tokio::test]
async fn test_create_openstack_cluster() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.27.9", "1.28.5"]).await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v2/projects/{PROJECT}/clusters")))
        .respond_with(ResponseTemplate::new(201).set_body_json(openstack_cluster("1.28.5")))
        .expect(1)
        .mount(&server)
        .await;
    mount_ready_cluster(&server, openstack_cluster("1.28.5")).await;

    let response = resource(&server)
        .create(&OperationContext::new(), openstack_plan())
        .await
        .expect("create should succeed");

    assert!(!response.has_errors(), "{}", response.diagnostics);
    let state = response.state.expect("state after create");
    assert_eq!(state.id.as_deref(), Some(CLUSTER));
    assert_eq!(state.project_id.as_deref(), Some(PROJECT));
    assert_eq!(state.spec.version, "1.28.5");
    assert_eq!(
        state.labels,
        BTreeMap::from([(String::from("team"), String::from("core"))])
    );
    assert!(state.kube_config.is_some());

    let openstack = state.spec.cloud.openstack.expect("openstack block");
    let credentials = openstack.application_credentials.expect("credentials kept");
    assert_eq!(credentials.id, "app-id");
    assert_eq!(credentials.secret, "app-secret");

    let posts = requests(&server, "POST", &format!("/api/v2/projects/{PROJECT}/clusters")).await;
    let body: Value = posts[0].body_json().expect("json body");
    let sent = &body["cluster"]["spec"]["cloud"];
    assert_eq!(sent["dc"], DATACENTER);
    assert_eq!(sent["openstack"]["applicationCredentialID"], "app-id");
    assert_eq!(sent["openstack"]["floatingIpPool"], "ext-net");
}

#[tokio::test]
async fn test_create_rejects_unknown_version_before_post() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.27.9"]).await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v2/projects/{PROJECT}/clusters")))
        .respond_with(ResponseTemplate::new(201).set_body_json(openstack_cluster("1.28.5")))
        .expect(0)
        .mount(&server)
        .await;

    let err = resource(&server)
        .create(&OperationContext::new(), openstack_plan())
        .await
        .expect_err("unknown version must be rejected");

    let diagnostics = err.to_diagnostics();
    let error = diagnostics.errors().next().expect("one error");
    assert_eq!(error.attribute.as_deref(), Some("spec.version"));
    assert!(error.summary.contains("1.28.5"));
    assert!(error.detail.contains("1.27.9"));
}

#[tokio::test]
async fn test_read_preserves_credentials_not_echoed() {
    let server = MockServer::start().await;
    mount_ready_cluster(&server, openstack_cluster("1.28.5")).await;

    let prior = user_credentials_state();
    let response = resource(&server)
        .read(&OperationContext::new(), prior.clone())
        .await
        .expect("read should succeed");

    let state = response.state.expect("cluster still exists");
    let openstack = state.spec.cloud.openstack.expect("openstack block");
    assert_eq!(
        openstack.user_credentials,
        prior.spec.cloud.openstack.and_then(|o| o.user_credentials)
    );
    assert_eq!(openstack.floating_ip_pool.as_deref(), Some("ext-net"));
    assert_eq!(state.labels, prior.labels);
    assert_eq!(state.spec.version, prior.spec.version);
}

#[tokio::test]
async fn test_read_warns_on_multiple_pod_cidrs() {
    let server = MockServer::start().await;
    let mut cluster = openstack_cluster("1.28.5");
    cluster["spec"]["clusterNetwork"] = json!({
        "pods": {"cidrBlocks": ["172.25.0.0/16", "fd00::/104"]},
        "services": {"cidrBlocks": ["10.240.16.0/20"]}
    });
    mount_ready_cluster(&server, cluster).await;

    let response = resource(&server)
        .read(&OperationContext::new(), user_credentials_state())
        .await
        .expect("read should succeed");

    assert!(!response.has_errors());
    assert!(
        response
            .diagnostics
            .warnings()
            .any(|d| d.summary.contains("Multiple CIDR blocks"))
    );
    let state = response.state.expect("cluster still exists");
    assert_eq!(state.spec.pods_cidr.as_deref(), Some("172.25.0.0/16"));
    assert_eq!(state.spec.services_cidr.as_deref(), Some("10.240.16.0/20"));
}

#[tokio::test]
async fn test_read_of_deleted_cluster_removes_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(cluster_path("")))
        .respond_with(api_error(404, "cluster not found"))
        .mount(&server)
        .await;

    let response = resource(&server)
        .read(&OperationContext::new(), user_credentials_state())
        .await
        .expect("read should succeed");

    assert!(response.state.is_none());
}

#[tokio::test]
async fn test_update_removes_label_with_null() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5"]).await;

    let mut updated = openstack_cluster("1.28.5");
    updated["labels"] = json!({"a": "b"});
    Mock::given(method("PATCH"))
        .and(path(cluster_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated.clone()))
        .expect(1)
        .mount(&server)
        .await;
    mount_ready_cluster(&server, updated).await;

    let mut prior: ClusterModel = serde_json::from_value(json!({
        "id": CLUSTER,
        "project_id": PROJECT,
        "name": "demo",
        "dc_name": DATACENTER,
        "labels": {"a": "b", "c": "d"},
        "spec": {
            "version": "1.28.5",
            "cloud": {
                "openstack": {
                    "application_credentials": {"id": "app-id", "secret": "app-secret"}
                }
            }
        }
    }))
    .expect("valid state");
    let mut plan = prior.clone();
    plan.labels.remove("c");

    let response = resource(&server)
        .update(&OperationContext::new(), prior.clone(), plan)
        .await
        .expect("update should succeed");
    assert!(!response.has_errors(), "{}", response.diagnostics);

    let patches = requests(&server, "PATCH", &cluster_path("")).await;
    assert_eq!(patches.len(), 1);
    let body: Value = patches[0].body_json().expect("json body");
    assert_eq!(body, json!({"labels": {"c": null}}));

    prior.labels.remove("c");
    let state = response.state.expect("state after update");
    assert_eq!(state.labels, prior.labels);
}

#[tokio::test]
async fn test_delete_waits_out_conflicts() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(cluster_path("")))
        .respond_with(api_error(409, "cluster has node deployments"))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_status(&server, "DELETE", &cluster_path(""), 200).await;

    let mut deleting = openstack_cluster("1.28.5");
    deleting["deletionTimestamp"] = json!("2024-05-02T11:00:00Z");
    Mock::given(method("GET"))
        .and(path(cluster_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(deleting))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(cluster_path("")))
        .respond_with(api_error(404, "cluster not found"))
        .mount(&server)
        .await;

    let diagnostics = resource(&server)
        .delete(&OperationContext::new(), user_credentials_state())
        .await
        .expect("delete should succeed");

    assert!(diagnostics.is_empty());
    assert_eq!(requests(&server, "DELETE", &cluster_path("")).await.len(), 4);
    assert_eq!(requests(&server, "GET", &cluster_path("")).await.len(), 3);
}

#[tokio::test]
async fn test_delete_of_missing_cluster_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(cluster_path("")))
        .respond_with(api_error(404, "cluster not found"))
        .expect(1)
        .mount(&server)
        .await;

    let diagnostics = resource(&server)
        .delete(&OperationContext::new(), user_credentials_state())
        .await
        .expect("delete should succeed");

    assert!(diagnostics.is_empty());
    assert!(requests(&server, "GET", &cluster_path("")).await.is_empty());
}

#[tokio::test]
async fn test_import_single_id_scans_projects() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "GET",
        "/api/v1/projects",
        json!([
            {"id": "proj-1", "name": "sandbox", "status": "Active"},
            {"id": "proj-7", "name": "locked", "status": "Active"},
            {"id": PROJECT, "name": "production", "status": "Active"}
        ]),
    )
    .await;
    mount_json(&server, "GET", "/api/v2/projects/proj-1/clusters", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/projects/proj-7/clusters"))
        .respond_with(api_error(403, "forbidden"))
        .mount(&server)
        .await;
    mount_json(
        &server,
        "GET",
        &format!("/api/v2/projects/{PROJECT}/clusters"),
        json!([openstack_cluster("1.28.5")]),
    )
    .await;
    mount_ready_cluster(&server, openstack_cluster("1.28.5")).await;

    let response = resource(&server)
        .import(&OperationContext::new(), CLUSTER)
        .await
        .expect("import should succeed");

    let state = response.state.expect("imported state");
    assert_eq!(state.id.as_deref(), Some(CLUSTER));
    assert_eq!(state.project_id.as_deref(), Some(PROJECT));
    assert_eq!(state.name, "demo");
    assert_eq!(state.dc_name, DATACENTER);
}

#[tokio::test]
async fn test_import_unknown_cluster_fails() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "GET",
        "/api/v1/projects",
        json!([{"id": "proj-1", "name": "sandbox"}]),
    )
    .await;
    mount_json(&server, "GET", "/api/v2/projects/proj-1/clusters", json!([])).await;

    let err = resource(&server)
        .import(&OperationContext::new(), CLUSTER)
        .await
        .expect_err("nothing to import");

    assert!(err.to_string().contains(CLUSTER));
}

#[tokio::test]
async fn test_import_rejects_malformed_id() {
    let server = MockServer::start().await;

    let err = resource(&server)
        .import(&OperationContext::new(), "proj-42:abc:extra")
        .await
        .expect_err("three parts are not a cluster id");

    assert!(err.to_string().contains("<project_id>:<cluster_id>"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

fn key(id: &str) -> Value {
    json!({"id": id, "name": id, "spec": {"publicKey": "ssh-ed25519 AAAA", "fingerprint": "aa"}})
}

#[tokio::test]
async fn test_update_reconciles_sshkeys() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5"]).await;
    Mock::given(method("DELETE"))
        .and(path(cluster_path("/sshkeys/key-1")))
        .respond_with(api_error(404, "key already detached"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(cluster_path("/sshkeys/key-3")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_json(&server, "GET", &cluster_path("/sshkeys"), json!([key("key-2"), key("key-3")])).await;
    mount_ready_cluster(&server, openstack_cluster("1.28.5")).await;

    let mut prior = user_credentials_state();
    prior.sshkeys = ["key-1", "key-2"].into_iter().map(String::from).collect();
    let mut plan = prior.clone();
    plan.sshkeys = ["key-2", "key-3"].into_iter().map(String::from).collect();

    let response = resource(&server)
        .update(&OperationContext::new(), prior, plan.clone())
        .await
        .expect("update should succeed");

    assert!(!response.has_errors(), "{}", response.diagnostics);
    assert_eq!(response.state.expect("state after update").sshkeys, plan.sshkeys);
    assert!(requests(&server, "PATCH", &cluster_path("")).await.is_empty());
    assert!(requests(&server, "PUT", &cluster_path("/sshkeys/key-2")).await.is_empty());
}

#[tokio::test]
async fn test_update_retries_patch_on_conflict() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5"]).await;
    Mock::given(method("PATCH"))
        .and(path(cluster_path("")))
        .respond_with(api_error(409, "the object has been modified"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_json(&server, "PATCH", &cluster_path(""), openstack_cluster("1.28.5")).await;
    mount_ready_cluster(&server, openstack_cluster("1.28.5")).await;

    let prior = user_credentials_state();
    let mut plan = prior.clone();
    plan.name = String::from("demo-renamed");

    let response = resource(&server)
        .update(&OperationContext::new(), prior, plan)
        .await
        .expect("update should succeed after conflicts");

    assert!(!response.has_errors(), "{}", response.diagnostics);
    let patches = requests(&server, "PATCH", &cluster_path("")).await;
    assert_eq!(patches.len(), 3);
    for patch in &patches {
        let body: Value = patch.body_json().expect("json body");
        assert_eq!(body, json!({"name": "demo-renamed"}));
    }
}

#[tokio::test]
async fn test_second_update_with_same_plan_writes_nothing() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5"]).await;
    let mut updated = openstack_cluster("1.28.5");
    updated["labels"] = json!({"team": "core", "env": "prod"});
    mount_json(&server, "PATCH", &cluster_path(""), updated.clone()).await;
    mount_ready_cluster(&server, updated.clone()).await;

    let prior = user_credentials_state();
    let mut plan = prior.clone();
    plan.labels.insert(String::from("env"), String::from("prod"));

    let first = resource(&server)
        .update(&OperationContext::new(), prior, plan)
        .await
        .expect("first update should succeed");
    let state = first.state.expect("state after first update");
    assert_eq!(requests(&server, "PATCH", &cluster_path("")).await.len(), 1);

    server.reset().await;
    mount_ready_cluster(&server, updated).await;

    let mut same = state.clone();
    same.kube_config = None;
    same.creation_timestamp = None;
    let second = resource(&server)
        .update(&OperationContext::new(), state.clone(), same)
        .await
        .expect("second update should succeed");

    assert_eq!(second.state.map(|s| s.labels), Some(state.labels));
    let received = server.received_requests().await.unwrap_or_default();
    assert!(!received.is_empty());
    assert!(received.iter().all(|r| r.method.as_str() == "GET"));
}

#[tokio::test]
async fn test_update_rejects_version_not_in_upgrades() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5", "1.29.0"]).await;
    mount_json(
        &server,
        "GET",
        &cluster_path("/upgrades"),
        json!([{"version": "1.28.9"}]),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path(cluster_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(openstack_cluster("1.29.0")))
        .expect(0)
        .mount(&server)
        .await;

    let prior = user_credentials_state();
    let mut plan = prior.clone();
    plan.spec.version = String::from("1.29.0");

    let err = resource(&server)
        .update(&OperationContext::new(), prior, plan)
        .await
        .expect_err("1.29.0 is not an allowed upgrade");

    let diagnostics = err.to_diagnostics();
    let error = diagnostics.errors().next().expect("one error");
    assert_eq!(error.attribute.as_deref(), Some("spec.version"));
    assert_eq!(error.summary, "Cannot upgrade to version 1.29.0");
    assert_eq!(error.detail, "Available upgrades: 1.28.9");
}

#[tokio::test]
async fn test_create_rejects_datacenter_of_other_provider() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5"]).await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v2/projects/{PROJECT}/clusters")))
        .respond_with(ResponseTemplate::new(201).set_body_json(openstack_cluster("1.28.5")))
        .expect(0)
        .mount(&server)
        .await;

    let mut plan = openstack_plan();
    plan.dc_name = String::from("aws-eu-central-1a");

    let err = resource(&server)
        .create(&OperationContext::new(), plan)
        .await
        .expect_err("datacenter does not serve openstack");

    let diagnostics = err.to_diagnostics();
    let error = diagnostics.errors().next().expect("one error");
    assert_eq!(error.attribute.as_deref(), Some("spec.cloud.openstack"));
    assert_eq!(
        error.summary,
        "Datacenter aws-eu-central-1a is not a openstack datacenter"
    );
    assert_eq!(error.detail, format!("Available openstack datacenters: {DATACENTER}"));
}

#[tokio::test]
async fn test_create_reports_unreachable_pool_and_subnet() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/providers/openstack/subnets"))
        .and(query_param("network_id", "net-int"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "sub-1", "name": "nodes"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v2/projects/{PROJECT}/clusters")))
        .respond_with(ResponseTemplate::new(201).set_body_json(openstack_cluster("1.28.5")))
        .expect(0)
        .mount(&server)
        .await;

    let mut plan = openstack_plan();
    let openstack = plan.spec.cloud.openstack.as_mut().expect("openstack block");
    openstack.floating_ip_pool = Some(String::from("public"));
    openstack.network = Some(String::from("demo-net"));
    openstack.subnet_id = Some(String::from("sub-9"));

    let err = resource(&server)
        .create(&OperationContext::new(), plan)
        .await
        .expect_err("pool and subnet do not exist");

    let diagnostics = err.to_diagnostics();
    let errors: Vec<(Option<&str>, &str, &str)> = diagnostics
        .errors()
        .map(|d| (d.attribute.as_deref(), d.summary.as_str(), d.detail.as_str()))
        .collect();
    assert_eq!(
        errors,
        vec![
            (
                Some("spec.cloud.openstack.floating_ip_pool"),
                "Unknown floating IP pool public",
                "Available floating IP pools: ext-net",
            ),
            (
                Some("spec.cloud.openstack.subnet_id"),
                "Subnet sub-9 not found in network demo-net",
                "Available subnets: nodes (sub-1)",
            ),
        ]
    );
}

#[tokio::test]
async fn test_create_reports_unknown_network() {
    let server = MockServer::start().await;
    mount_openstack_catalogue(&server, &["1.28.5"]).await;

    let mut plan = openstack_plan();
    let openstack = plan.spec.cloud.openstack.as_mut().expect("openstack block");
    openstack.network = Some(String::from("missing-net"));

    let err = resource(&server)
        .create(&OperationContext::new(), plan)
        .await
        .expect_err("network does not exist");

    let diagnostics = err.to_diagnostics();
    let error = diagnostics.errors().next().expect("one error");
    assert_eq!(error.attribute.as_deref(), Some("spec.cloud.openstack.network"));
    assert_eq!(error.summary, "Unknown network missing-net");
    assert_eq!(error.detail, "Available networks: demo-net");
    assert!(requests(&server, "POST", &format!("/api/v2/projects/{PROJECT}/clusters")).await.is_empty());
}

#[tokio::test]
async fn test_delete_reports_cancellation() {
    let server = MockServer::start().await;
    mount_status(&server, "DELETE", &cluster_path(""), 200).await;
    mount_json(&server, "GET", &cluster_path(""), openstack_cluster("1.28.5")).await;

    let ctx = OperationContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = resource(&server)
        .delete(&ctx, user_credentials_state())
        .await
        .expect_err("cancelled while the cluster still exists");

    assert!(matches!(err, MetaKubeError::OperationCancelled));
    assert_eq!(err.to_string(), "Operation cancelled");
    assert_eq!(requests(&server, "DELETE", &cluster_path("")).await.len(), 1);
}
