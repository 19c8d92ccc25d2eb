//! Resource reconcilers and the project data source.
//!
//! Every managed type implements [`Resource`]: `create`, `read`, `update`,
//! `delete` and `import` over a typed model. Operations are driven by an
//! [`OperationContext`] and return a [`Response`] holding the new state plus
//! any diagnostics. A `Response` may carry both a state and an error
//! diagnostic, e.g. when a readiness wait timed out after the object was
//! created.

pub mod cluster;
pub mod import;
pub mod node_deployment;
pub mod project;
pub mod role_binding;
pub mod sshkey;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::MetaKubeClient;
use crate::context::OperationContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ImportError, MetaKubeError, Result};
use crate::schema::Schema;

pub use cluster::{ClusterResource, wait_for_cluster_ready};
pub use node_deployment::NodeDeploymentResource;
pub use project::ProjectDataSource;
pub use role_binding::{ClusterRoleBindingResource, RoleBindingResource};
pub use sshkey::SshKeyResource;

/// Outcome of a resource operation.
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// New state; `None` when the object no longer exists.
    pub state: Option<T>,
    /// Warnings and errors collected along the way.
    pub diagnostics: Diagnostics,
}

impl<T> Response<T> {
    /// A response carrying `state` and no diagnostics.
    #[must_use]
    pub fn new(state: T) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    /// A response telling the orchestrator to drop the object from state.
    #[must_use]
    pub fn removed() -> Self {
        Self {
            state: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Prepends `earlier` to the diagnostics of this response.
    #[must_use]
    pub fn with_diagnostics(mut self, earlier: Diagnostics) -> Self {
        let mut all = earlier;
        all.extend(self.diagnostics);
        self.diagnostics = all;
        self
    }

    /// Appends the diagnostics of `error`.
    #[must_use]
    pub fn with_error(mut self, error: &MetaKubeError) -> Self {
        self.diagnostics.extend(error.to_diagnostics());
        self
    }

    /// Returns true if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// A managed resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Typed model of the resource.
    type Model: Clone + Send + Sync + Serialize + DeserializeOwned;

    /// Attribute table used to decode, default and redact models.
    fn schema(&self) -> &'static Schema;

    /// Creates the object described by `plan`.
    async fn create(&self, ctx: &OperationContext, plan: Self::Model) -> Result<Response<Self::Model>>;

    /// Refreshes `state` from the API.
    async fn read(&self, ctx: &OperationContext, state: Self::Model) -> Result<Response<Self::Model>>;

    /// Moves the object from `prior` to `plan`.
    async fn update(
        &self,
        ctx: &OperationContext,
        prior: Self::Model,
        plan: Self::Model,
    ) -> Result<Response<Self::Model>>;

    /// Deletes the object; deleting an absent object succeeds.
    async fn delete(&self, ctx: &OperationContext, state: Self::Model) -> Result<Diagnostics>;

    /// Builds state from an import identifier.
    async fn import(&self, ctx: &OperationContext, id: &str) -> Result<Response<Self::Model>>;
}

/// Fails with one diagnostic per attribute whose change needs a new object.
///
/// # Errors
///
/// Returns [`MetaKubeError::Validation`] when a force-new attribute differs,
/// or a serialization error.
pub fn ensure_in_place<T: Serialize>(schema: &Schema, prior: &T, plan: &T) -> Result<()> {
    let prior = serde_json::to_value(prior)?;
    let plan = serde_json::to_value(plan)?;

    let diagnostics: Diagnostics = schema
        .requires_replacement(&prior, &plan)
        .into_iter()
        .map(|path| {
            Diagnostic::error(
                "Attribute requires replacement",
                format!("Changing {path} of {} needs a new object.", schema.type_name),
            )
            .with_attribute(path)
        })
        .collect();

    diagnostics.into_result().map(|_| ())
}

/// Returns `project` when set, otherwise scans every visible project for
/// `cluster_id`.
///
/// # Errors
///
/// Returns [`ImportError::OwnerNotFound`] when no project owns the cluster,
/// or the API error of a failed listing.
pub async fn resolve_project(
    client: &MetaKubeClient,
    project: Option<&str>,
    cluster_id: &str,
) -> Result<String> {
    if let Some(project) = project.filter(|p| !p.is_empty()) {
        return Ok(project.to_string());
    }

    find_cluster_project(client, cluster_id)
        .await?
        .ok_or_else(|| {
            ImportError::OwnerNotFound {
                what: "cluster",
                id: cluster_id.to_string(),
            }
            .into()
        })
}

/// Scans projects for the one owning `cluster_id`.
///
/// Projects the token cannot list are skipped.
///
/// # Errors
///
/// Returns the API error of a failed listing.
pub async fn find_cluster_project(client: &MetaKubeClient, cluster_id: &str) -> Result<Option<String>> {
    debug!("Scanning projects for cluster {cluster_id}");

    for project in client.list_projects().await? {
        match client.list_clusters(&project.id).await {
            Ok(clusters) if clusters.iter().any(|c| c.id == cluster_id) => {
                debug!("Cluster {cluster_id} belongs to project {}", project.id);
                return Ok(Some(project.id));
            }
            Ok(_) => {}
            Err(e) if e.is_gone() => debug!("Skipping project {}: {e}", project.id),
            Err(e) => return Err(e),
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::sshkey::{SCHEMA, SshKeyModel};

    #[test]
    fn test_ensure_in_place_reports_each_path() {
        let prior = SshKeyModel {
            id: Some(String::from("k")),
            project_id: Some(String::from("p")),
            name: String::from("laptop"),
            public_key: String::from("ssh-ed25519 AAAA"),
        };
        let mut plan = prior.clone();
        plan.name = String::from("desktop");
        plan.public_key = String::from("ssh-ed25519 BBBB");

        let err = ensure_in_place(&SCHEMA, &prior, &plan).expect_err("should refuse");
        let attributes: Vec<String> = err
            .to_diagnostics()
            .iter()
            .filter_map(|d| d.attribute.clone())
            .collect();
        assert_eq!(attributes, vec!["name", "public_key"]);

        assert!(ensure_in_place(&SCHEMA, &prior, &prior).is_ok());
    }

    #[test]
    fn test_response_keeps_earlier_diagnostics_first() {
        let mut earlier = Diagnostics::new();
        earlier.warn("first", "");
        let mut response = Response::new(1);
        response.diagnostics.warn("second", "");

        let response = response.with_diagnostics(earlier);
        let summaries: Vec<&str> = response
            .diagnostics
            .iter()
            .map(|d| d.summary.as_str())
            .collect();
        assert_eq!(summaries, vec!["first", "second"]);
        assert!(!response.has_errors());
    }
}
