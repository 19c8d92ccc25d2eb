//! `metakube_node_deployment` reconciler.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::types::{Node, NodeDeploymentPatch};
use crate::api::MetaKubeClient;
use crate::context::OperationContext;
use crate::diagnostics::Diagnostics;
use crate::error::{ImportError, MetaKubeError, Result};
use crate::retry::{PollSettings, RetryError, retry};
use crate::schema::Schema;
use crate::schema::node_deployment::{NodeDeploymentModel, SCHEMA};
use crate::schema::timeouts::{TimeoutDefaults, Timeouts};
use crate::translate::node_deployment::expand_node_deployment_spec;
use crate::translate::{expand_node_deployment, flatten_node_deployment, label_removal_patch};
use crate::validate::NodeDeploymentValidator;

use super::cluster::wait_for_cluster_ready;
use super::import::parse_node_deployment_id;
use super::{Resource, Response, ensure_in_place, find_cluster_project, resolve_project};

/// Server messages seen while a fresh cluster's admission webhooks start.
const WEBHOOK_NOT_READY: &[&str] = &[
    "failed calling webhook",
    "Cluster components are not ready yet",
];

/// Server message of an optimistic-concurrency conflict.
const OBJECT_MODIFIED: &str = "the object has been modified";

/// Waits until every replica is ready and backed by a node reporting its
/// kernel version.
///
/// # Errors
///
/// Returns [`MetaKubeError::Timeout`] or [`MetaKubeError::Cancelled`]
/// wrapping the last observation, or a permanent API error.
pub async fn wait_for_node_deployment_ready(
    client: &MetaKubeClient,
    ctx: &OperationContext,
    poll: &PollSettings,
    (project, cluster, id): (&str, &str, &str),
    timeout: Duration,
) -> Result<()> {
    debug!("Waiting up to {}s for node deployment {id}", timeout.as_secs());

    retry(ctx, timeout, poll, "node deployment readiness", move || async move {
        let deployment = client
            .get_node_deployment(project, cluster, id)
            .await
            .map_err(RetryError::classify)?;

        let Some(replicas) = deployment.spec.replicas else {
            return Err(RetryError::retryable(MetaKubeError::not_ready(format!(
                "node deployment {id} has no replica count yet"
            ))));
        };
        let status = deployment.status.unwrap_or_default();
        if status.ready_replicas < replicas || status.unavailable_replicas != 0 {
            return Err(RetryError::retryable(MetaKubeError::not_ready(format!(
                "node deployment {id}: {} of {replicas} replicas ready, {} unavailable",
                status.ready_replicas, status.unavailable_replicas
            ))));
        }

        let nodes = client
            .list_node_deployment_nodes(project, cluster, id)
            .await
            .map_err(RetryError::classify)?;
        let expected = usize::try_from(replicas).unwrap_or_default();
        if nodes.len() != expected || !nodes.iter().all(Node::has_kernel_version) {
            return Err(RetryError::retryable(MetaKubeError::not_ready(format!(
                "node deployment {id}: {} of {expected} nodes joined",
                nodes.iter().filter(|n| n.has_kernel_version()).count()
            ))));
        }

        Ok(())
    })
    .await?;

    info!("Node deployment {id} is ready");
    Ok(())
}

/// Reconciles node deployments.
#[derive(Debug, Clone)]
pub struct NodeDeploymentResource {
    client: MetaKubeClient,
    poll: PollSettings,
}

impl NodeDeploymentResource {
    /// Creates a reconciler using the default poll cadence.
    #[must_use]
    pub fn new(client: MetaKubeClient) -> Self {
        Self {
            client,
            poll: PollSettings::default(),
        }
    }

    /// Overrides the poll cadence.
    #[must_use]
    pub const fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    async fn refresh(
        &self,
        project: &str,
        cluster: &str,
        id: &str,
        prior: &NodeDeploymentModel,
    ) -> Result<Response<NodeDeploymentModel>> {
        let deployment = match self.client.get_node_deployment(project, cluster, id).await {
            Ok(deployment) => deployment,
            // A deleted cluster answers 403 for its node deployments.
            Err(e) if e.is_gone() => {
                warn!("Node deployment {id} not found ({e}), removing it from state");
                return Ok(Response::removed());
            }
            Err(e) => return Err(e),
        };

        let mut model = flatten_node_deployment(&deployment);
        model.project_id = Some(project.to_string());
        model.cluster_id = cluster.to_string();
        model.timeouts.clone_from(&prior.timeouts);
        Ok(Response::new(model))
    }

    async fn settle(
        &self,
        ctx: &OperationContext,
        (project, cluster, id): (&str, &str, &str),
        prior: &NodeDeploymentModel,
        outcome: Result<()>,
        diagnostics: Diagnostics,
    ) -> Result<Response<NodeDeploymentModel>> {
        let response = match outcome {
            Ok(()) => self.refresh(project, cluster, id, prior).await?,
            Err(e) if ctx.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("Node deployment {id} did not settle: {e}");
                match self.refresh(project, cluster, id, prior).await {
                    Ok(response) => response.with_error(&e),
                    Err(refresh) => {
                        debug!("Refresh after failure also failed: {refresh}");
                        return Err(e);
                    }
                }
            }
        };
        Ok(response.with_diagnostics(diagnostics))
    }

    async fn validate(&self, project: &str, model: &NodeDeploymentModel) -> Result<Diagnostics> {
        let cluster = self.client.get_cluster(project, &model.cluster_id).await?;
        NodeDeploymentValidator::new(&self.client)
            .validate(model, &cluster)
            .await?
            .into_result()
    }
}

#[async_trait]
impl Resource for NodeDeploymentResource {
    type Model = NodeDeploymentModel;

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        mut plan: NodeDeploymentModel,
    ) -> Result<Response<NodeDeploymentModel>> {
        let timeout = Timeouts::create_or(plan.timeouts.as_ref(), TimeoutDefaults::NODE_DEPLOYMENT)?;
        let project = resolve_project(&self.client, plan.project(), &plan.cluster_id).await?;
        let cluster = plan.cluster_id.clone();

        if let Some(min) = plan.spec.min_replicas {
            plan.spec.replicas = Some(min);
        }
        let diagnostics = self.validate(&project, &plan).await?;

        wait_for_cluster_ready(&self.client, ctx, &self.poll, &project, &cluster, None, timeout)
            .await?;

        let client = &self.client;
        let (p, c) = (project.as_str(), cluster.as_str());
        retry(ctx, timeout, &self.poll, "list node deployments", move || async move {
            client
                .list_node_deployments(p, c)
                .await
                .map(|_| ())
                .map_err(RetryError::Retryable)
        })
        .await?;

        let body = expand_node_deployment(&plan);
        let body = &body;
        info!("Creating node deployment in cluster {cluster}");
        let created = retry(ctx, timeout, &self.poll, "create node deployment", move || async move {
            client.create_node_deployment(p, c, body).await.map_err(|e| {
                if WEBHOOK_NOT_READY.iter().any(|needle| e.mentions(needle)) {
                    RetryError::Retryable(e)
                } else {
                    RetryError::classify(e)
                }
            })
        })
        .await?;
        if created.id.is_empty() {
            return Err(MetaKubeError::InvalidResponse {
                operation: String::from("create node deployment"),
                message: String::from("response carries no node deployment id"),
            });
        }
        let id = created.id;
        info!("Node deployment {id} created");

        plan.id = Some(id.clone());
        plan.project_id = Some(project.clone());

        let outcome =
            wait_for_node_deployment_ready(&self.client, ctx, &self.poll, (p, c, id.as_str()), timeout)
                .await;
        self.settle(ctx, (p, c, id.as_str()), &plan, outcome, diagnostics)
            .await
    }

    async fn read(
        &self,
        _ctx: &OperationContext,
        state: NodeDeploymentModel,
    ) -> Result<Response<NodeDeploymentModel>> {
        let Some(id) = state.deployment_id() else {
            return Ok(Response::removed());
        };

        let project = match state.project() {
            Some(project) => project.to_string(),
            None => {
                if let Some(project) = find_cluster_project(&self.client, &state.cluster_id).await? {
                    project
                } else {
                    warn!("Cluster {} not found in any project", state.cluster_id);
                    return Ok(Response::removed());
                }
            }
        };

        self.refresh(&project, &state.cluster_id, id, &state).await
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        prior: NodeDeploymentModel,
        mut plan: NodeDeploymentModel,
    ) -> Result<Response<NodeDeploymentModel>> {
        ensure_in_place(&SCHEMA, &prior, &plan)?;

        let id = prior
            .deployment_id()
            .ok_or_else(|| MetaKubeError::internal("node deployment id is not set"))?
            .to_string();
        let project = resolve_project(&self.client, prior.project(), &prior.cluster_id).await?;
        let cluster = prior.cluster_id.clone();
        let (p, c) = (project.as_str(), cluster.as_str());

        plan.id = Some(id.clone());
        plan.project_id = Some(project.clone());
        if plan.name.is_none() {
            plan.name.clone_from(&prior.name);
        }
        if plan.spec.replicas.is_none() {
            plan.spec.replicas = prior.spec.replicas;
        }

        let spec = expand_node_deployment_spec(&plan.spec);
        if spec == expand_node_deployment_spec(&prior.spec) {
            debug!("Node deployment {id} is up to date");
            return self.refresh(p, c, &id, &plan).await;
        }

        let timeout = Timeouts::update_or(plan.timeouts.as_ref(), TimeoutDefaults::NODE_DEPLOYMENT)?;
        let diagnostics = self.validate(p, &plan).await?;

        info!("Updating node deployment {id}");
        let outcome = async {
            self.client
                .patch_node_deployment(p, c, &id, &NodeDeploymentPatch { spec })
                .await?;

            if let Some(removal) = label_removal_patch(&prior.spec.template.labels, &plan.spec.template.labels) {
                let client = &self.client;
                let (id, removal) = (id.as_str(), &removal);
                debug!("Removing labels from node deployment {id}: {removal}");
                retry(ctx, timeout, &self.poll, "remove node deployment labels", move || async move {
                    client
                        .patch_node_deployment_raw(p, c, id, removal)
                        .await
                        .map(|_| ())
                        .map_err(|e| {
                            if e.mentions(OBJECT_MODIFIED) {
                                RetryError::Retryable(e)
                            } else {
                                RetryError::classify(e)
                            }
                        })
                })
                .await?;
            }

            wait_for_node_deployment_ready(&self.client, ctx, &self.poll, (p, c, id.as_str()), timeout)
                .await
        }
        .await;

        self.settle(ctx, (p, c, id.as_str()), &plan, outcome, diagnostics)
            .await
    }

    async fn delete(&self, ctx: &OperationContext, state: NodeDeploymentModel) -> Result<Diagnostics> {
        let Some(id) = state.deployment_id() else {
            return Ok(Diagnostics::new());
        };
        let project = match state.project() {
            Some(project) => project.to_string(),
            None => match find_cluster_project(&self.client, &state.cluster_id).await? {
                Some(project) => project,
                None => return Ok(Diagnostics::new()),
            },
        };
        let timeout = Timeouts::delete_or(state.timeouts.as_ref(), TimeoutDefaults::NODE_DEPLOYMENT)?;
        let (p, c) = (project.as_str(), state.cluster_id.as_str());

        info!("Deleting node deployment {id}");
        match self.client.delete_node_deployment(p, c, id).await {
            Ok(()) => {}
            Err(e) if e.is_gone() => return Ok(Diagnostics::new()),
            Err(e) => return Err(e),
        }

        let client = &self.client;
        retry(ctx, timeout, &self.poll, "node deployment deletion", move || async move {
            match client.get_node_deployment(p, c, id).await {
                Ok(_) => Err(RetryError::retryable(MetaKubeError::not_ready(format!(
                    "node deployment {id} still exists"
                )))),
                Err(e) if e.is_gone() => Ok(()),
                Err(e) => Err(RetryError::classify(e)),
            }
        })
        .await?;

        info!("Node deployment {id} deleted");
        Ok(Diagnostics::new())
    }

    async fn import(&self, ctx: &OperationContext, id: &str) -> Result<Response<NodeDeploymentModel>> {
        let [project, cluster, deployment] = parse_node_deployment_id(id)?;

        let state = NodeDeploymentModel {
            id: Some(deployment.clone()),
            project_id: Some(project),
            cluster_id: cluster,
            ..NodeDeploymentModel::default()
        };
        let response = self.read(ctx, state).await?;
        if response.state.is_none() {
            return Err(ImportError::OwnerNotFound {
                what: "node deployment",
                id: deployment,
            }
            .into());
        }
        Ok(response)
    }
}
