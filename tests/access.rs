//! SSH keys, role bindings and the project data source against a mocked
//! MetaKube API.

mod common;

use common::{CLUSTER, PROJECT, api_error, client, cluster_path, mount_json, mount_status, requests};
use metakube_provider::context::OperationContext;
use metakube_provider::resources::{
    ClusterRoleBindingResource, ProjectDataSource, Resource, RoleBindingResource, SshKeyResource,
};
use metakube_provider::schema::{
    ClusterRoleBindingModel, RoleBindingModel, SshKeyModel, SubjectKindModel, SubjectModel,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIG0ps laptop";

fn sshkeys_path() -> String {
    format!("/api/v1/projects/{PROJECT}/sshkeys")
}

fn server_key() -> Value {
    json!({
        "id": "key-1",
        "name": "laptop",
        "creationTimestamp": "2024-05-02T09:00:00Z",
        "spec": {"publicKey": PUBLIC_KEY, "fingerprint": "aa:bb:cc"}
    })
}

fn subject(kind: SubjectKindModel, name: &str) -> SubjectModel {
    SubjectModel {
        kind,
        name: name.to_string(),
    }
}

fn projects() -> Value {
    json!([
        {"id": "proj-1", "name": "sandbox", "status": "Active"},
        {"id": PROJECT, "name": "production", "status": "Active", "labels": {"cost-center": "42"}},
        {"id": "proj-9", "name": "staging", "status": "Active"},
        {"id": "proj-10", "name": "staging", "status": "Inactive"}
    ])
}

#[tokio::test]
async fn test_create_sshkey_keeps_key_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(sshkeys_path()))
        .respond_with(ResponseTemplate::new(201).set_body_json(server_key()))
        .expect(1)
        .mount(&server)
        .await;

    let plan = SshKeyModel {
        id: None,
        project_id: Some(String::from(PROJECT)),
        name: String::from("laptop"),
        public_key: format!("{PUBLIC_KEY}\n"),
    };
    let response = SshKeyResource::new(client(&server))
        .create(&OperationContext::new(), plan.clone())
        .await
        .expect("create should succeed");

    let state = response.state.expect("state after create");
    assert_eq!(state.key_id(), Some("key-1"));
    assert_eq!(state.public_key, plan.public_key);

    let posts = requests(&server, "POST", &sshkeys_path()).await;
    let body: Value = posts[0].body_json().expect("json body");
    assert_eq!(body["name"], "laptop");
    assert_eq!(body["spec"]["publicKey"], plan.public_key);
}

#[tokio::test]
async fn test_create_sshkey_requires_project() {
    let server = MockServer::start().await;
    let plan = SshKeyModel {
        id: None,
        project_id: None,
        name: String::from("laptop"),
        public_key: String::from(PUBLIC_KEY),
    };

    let err = SshKeyResource::new(client(&server))
        .create(&OperationContext::new(), plan)
        .await
        .expect_err("no project to create in");

    assert!(err.to_string().contains("project_id"));
}

#[tokio::test]
async fn test_import_sshkey_scans_projects() {
    let server = MockServer::start().await;
    mount_json(&server, "GET", "/api/v1/projects", projects()).await;
    mount_json(&server, "GET", "/api/v1/projects/proj-1/sshkeys", json!([])).await;
    mount_json(&server, "GET", &sshkeys_path(), json!([server_key()])).await;

    let response = SshKeyResource::new(client(&server))
        .import(&OperationContext::new(), "key-1")
        .await
        .expect("import should succeed");

    let state = response.state.expect("imported state");
    assert_eq!(state.project_id.as_deref(), Some(PROJECT));
    assert_eq!(state.name, "laptop");
    assert_eq!(state.public_key, PUBLIC_KEY);
}

#[tokio::test]
async fn test_update_sshkey_ignores_surrounding_whitespace() {
    let server = MockServer::start().await;
    mount_json(&server, "GET", &sshkeys_path(), json!([server_key()])).await;

    let prior = SshKeyModel {
        id: Some(String::from("key-1")),
        project_id: Some(String::from(PROJECT)),
        name: String::from("laptop"),
        public_key: String::from(PUBLIC_KEY),
    };
    let mut plan = prior.clone();
    plan.public_key = format!("{PUBLIC_KEY}\n");

    let response = SshKeyResource::new(client(&server))
        .update(&OperationContext::new(), prior.clone(), plan)
        .await
        .expect("whitespace-only change stays in place");

    assert_eq!(response.state, Some(prior));
    assert!(requests(&server, "POST", &sshkeys_path()).await.is_empty());
}

#[tokio::test]
async fn test_delete_missing_sshkey_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/key-1", sshkeys_path())))
        .respond_with(api_error(404, "ssh key not found"))
        .expect(1)
        .mount(&server)
        .await;

    let state = SshKeyModel {
        id: Some(String::from("key-1")),
        project_id: Some(String::from(PROJECT)),
        name: String::from("laptop"),
        public_key: String::from(PUBLIC_KEY),
    };
    let diagnostics = SshKeyResource::new(client(&server))
        .delete(&OperationContext::new(), state)
        .await
        .expect("delete should succeed");

    assert!(diagnostics.is_empty());
}

#[tokio::test]
async fn test_role_binding_binds_each_subject() {
    let server = MockServer::start().await;
    let bind_path = cluster_path("/roles/default/namespace-admin/bindings");
    mount_status(&server, "POST", &bind_path, 200).await;
    mount_json(
        &server,
        "GET",
        &cluster_path("/bindings"),
        json!([
            {
                "namespace": "default",
                "roleRefName": "namespace-admin",
                "subjects": [
                    {"kind": "Group", "name": "ops", "apiGroup": "rbac.authorization.k8s.io"},
                    {"kind": "User", "name": "jane@example.com", "apiGroup": "rbac.authorization.k8s.io"}
                ]
            },
            {
                "namespace": "kube-system",
                "roleRefName": "namespace-admin",
                "subjects": [{"kind": "User", "name": "root@example.com"}]
            }
        ]),
    )
    .await;

    let plan = RoleBindingModel {
        project_id: Some(String::from(PROJECT)),
        cluster_id: String::from(CLUSTER),
        namespace: String::from("default"),
        role_name: String::from("namespace-admin"),
        subjects: vec![
            subject(SubjectKindModel::User, "jane@example.com"),
            subject(SubjectKindModel::Group, "ops"),
        ],
    };
    let response = RoleBindingResource::new(client(&server))
        .create(&OperationContext::new(), plan.clone())
        .await
        .expect("create should succeed");

    let state = response.state.expect("state after create");
    assert_eq!(state.subjects, plan.subjects);

    let bodies: Vec<Value> = requests(&server, "POST", &bind_path)
        .await
        .iter()
        .map(|r| r.body_json().expect("json body"))
        .collect();
    assert_eq!(
        bodies,
        vec![json!({"userEmail": "jane@example.com"}), json!({"group": "ops"})]
    );
}

#[tokio::test]
async fn test_role_binding_read_drops_missing_binding() {
    let server = MockServer::start().await;
    mount_json(&server, "GET", &cluster_path("/bindings"), json!([])).await;

    let state = RoleBindingModel {
        project_id: Some(String::from(PROJECT)),
        cluster_id: String::from(CLUSTER),
        namespace: String::from("default"),
        role_name: String::from("view"),
        subjects: vec![subject(SubjectKindModel::User, "jane@example.com")],
    };
    let response = RoleBindingResource::new(client(&server))
        .read(&OperationContext::new(), state)
        .await
        .expect("read should succeed");

    assert!(response.state.is_none());
}

#[tokio::test]
async fn test_role_binding_update_refuses_changes() {
    let server = MockServer::start().await;
    let prior = RoleBindingModel {
        project_id: Some(String::from(PROJECT)),
        cluster_id: String::from(CLUSTER),
        namespace: String::from("default"),
        role_name: String::from("view"),
        subjects: vec![subject(SubjectKindModel::User, "jane@example.com")],
    };
    let mut plan = prior.clone();
    plan.role_name = String::from("edit");

    let err = RoleBindingResource::new(client(&server))
        .update(&OperationContext::new(), prior, plan)
        .await
        .expect_err("role changes need a new binding");

    let attributes: Vec<String> = err
        .to_diagnostics()
        .iter()
        .filter_map(|d| d.attribute.clone())
        .collect();
    assert_eq!(attributes, vec!["role_name"]);
}

#[tokio::test]
async fn test_cluster_role_binding_delete_unbinds_subjects() {
    let server = MockServer::start().await;
    let bind_path = cluster_path("/clusterroles/cluster-admin/clusterbindings");
    Mock::given(method("DELETE"))
        .and(path(bind_path.clone()))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(bind_path.clone()))
        .respond_with(api_error(404, "subject not bound"))
        .mount(&server)
        .await;

    let state = ClusterRoleBindingModel {
        project_id: Some(String::from(PROJECT)),
        cluster_id: String::from(CLUSTER),
        cluster_role_name: String::from("cluster-admin"),
        subjects: vec![
            subject(SubjectKindModel::User, "jane@example.com"),
            subject(SubjectKindModel::User, "gone@example.com"),
        ],
    };
    let diagnostics = ClusterRoleBindingResource::new(client(&server))
        .delete(&OperationContext::new(), state)
        .await
        .expect("delete should succeed");

    assert!(diagnostics.is_empty());
    assert_eq!(requests(&server, "DELETE", &bind_path).await.len(), 2);
}

#[tokio::test]
async fn test_cluster_role_binding_import() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "GET",
        &cluster_path("/clusterbindings"),
        json!([
            {"roleRefName": "cluster-admin", "subjects": [{"kind": "Group", "name": "ops"}]},
            {"roleRefName": "view", "subjects": [{"kind": "User", "name": "jane@example.com"}]}
        ]),
    )
    .await;

    let response = ClusterRoleBindingResource::new(client(&server))
        .import(
            &OperationContext::new(),
            &format!("{PROJECT}:{CLUSTER}:cluster-admin"),
        )
        .await
        .expect("import should succeed");

    let state = response.state.expect("imported state");
    assert_eq!(state.cluster_role_name, "cluster-admin");
    assert_eq!(state.subjects, vec![subject(SubjectKindModel::Group, "ops")]);
}

#[tokio::test]
async fn test_project_lookup_by_name() {
    let server = MockServer::start().await;
    mount_json(&server, "GET", "/api/v1/projects", projects()).await;
    let source = ProjectDataSource::new(client(&server));
    let ctx = OperationContext::new();

    let found = source.read(&ctx, "production").await.expect("lookup should succeed");
    let project = found.state.expect("one project");
    assert_eq!(project.id, PROJECT);
    assert_eq!(project.labels.get("cost-center").map(String::as_str), Some("42"));

    let missing = source.read(&ctx, "nope").await.expect("lookup should succeed");
    assert!(missing.state.is_none());
    assert!(missing.has_errors());

    let ambiguous = source.read(&ctx, "staging").await.expect("lookup should succeed");
    assert!(ambiguous.state.is_none());
    let error = ambiguous.diagnostics.errors().next().expect("one error");
    assert_eq!(error.summary, "Ambiguous project name");
    assert!(error.detail.contains("proj-9"));
    assert!(error.detail.contains("proj-10"));
}
