//! `metakube_cluster` reconciler.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::types::ClusterPatch;
use crate::api::MetaKubeClient;
use crate::context::OperationContext;
use crate::diagnostics::Diagnostics;
use crate::error::{ConfigError, ImportError, MetaKubeError, Result};
use crate::retry::{PollSettings, RetryError, Tick, Ticker, retry};
use crate::schema::Schema;
use crate::schema::cluster::{ClusterModel, SCHEMA};
use crate::schema::timeouts::{TimeoutDefaults, Timeouts};
use crate::translate::{ChangeSet, ClusterPreserved, cluster_patch, expand_cluster, flatten_cluster};
use crate::validate::{ClusterValidator, same_version};

use super::import::parse_cluster_id;
use super::{Resource, Response, ensure_in_place, find_cluster_project, resolve_project};

/// Waits until every control-plane component is up and, when `target` is
/// given, the cluster reports that version.
///
/// # Errors
///
/// Returns [`MetaKubeError::Timeout`] or [`MetaKubeError::Cancelled`]
/// wrapping the last observation, or a permanent API error.
pub async fn wait_for_cluster_ready(
    client: &MetaKubeClient,
    ctx: &OperationContext,
    poll: &PollSettings,
    project: &str,
    id: &str,
    target: Option<&str>,
    timeout: Duration,
) -> Result<()> {
    debug!("Waiting up to {}s for cluster {id} to be ready", timeout.as_secs());

    retry(ctx, timeout, poll, "cluster readiness", move || async move {
        let health = client.cluster_health(project, id).await.map_err(|e| {
            if e.is_not_found() {
                RetryError::Retryable(e)
            } else {
                RetryError::classify(e)
            }
        })?;

        let pending = health.components_not_up();
        if !pending.is_empty() {
            return Err(RetryError::retryable(MetaKubeError::not_ready(format!(
                "cluster {id} components not up: {}",
                pending.join(", ")
            ))));
        }

        if let Some(target) = target {
            let cluster = client
                .get_cluster(project, id)
                .await
                .map_err(RetryError::classify)?;
            let actual = cluster
                .status
                .as_ref()
                .map(|s| s.version.as_str())
                .filter(|v| !v.is_empty())
                .or(cluster.spec.version.as_deref())
                .unwrap_or_default();
            if !same_version(actual, target) {
                return Err(RetryError::retryable(MetaKubeError::not_ready(format!(
                    "cluster {id} runs version {actual}, waiting for {target}"
                ))));
            }
        }

        Ok(())
    })
    .await?;

    info!("Cluster {id} is ready");
    Ok(())
}

fn kubeconfig_or_warn(
    kind: &str,
    fetched: Result<String>,
    previous: Option<&String>,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    match fetched {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Could not fetch {kind}: {e}");
            diagnostics.warn(format!("Could not fetch {kind}"), e.to_string());
            previous.cloned()
        }
    }
}

/// Reconciles clusters.
#[derive(Debug, Clone)]
pub struct ClusterResource {
    client: MetaKubeClient,
    poll: PollSettings,
}

impl ClusterResource {
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

    /// Fetches the cluster and its companions into a model.
    ///
    /// `prior` supplies the values the API does not echo.
    async fn refresh(&self, project: &str, id: &str, prior: &ClusterModel) -> Result<Response<ClusterModel>> {
        let cluster = match self.client.get_cluster(project, id).await {
            Ok(cluster) => cluster,
            Err(e) if e.is_not_found() => {
                warn!("Cluster {id} not found, removing it from state");
                return Ok(Response::removed());
            }
            Err(e) => return Err(e),
        };

        let mut diagnostics = Diagnostics::new();
        let mut model = flatten_cluster(&cluster, &ClusterPreserved::from_model(prior), &mut diagnostics);
        model.project_id = Some(project.to_string());
        model.timeouts.clone_from(&prior.timeouts);

        model.sshkeys = match self.client.list_cluster_sshkeys(project, id).await {
            Ok(keys) => keys.into_iter().map(|key| key.id).collect(),
            Err(e) if e.is_gone() => {
                debug!("SSH keys of cluster {id} unavailable: {e}");
                prior.sshkeys.clone()
            }
            Err(e) => return Err(e),
        };

        model.kube_config = kubeconfig_or_warn(
            "kubeconfig",
            self.client.kubeconfig(project, id).await,
            prior.kube_config.as_ref(),
            &mut diagnostics,
        );
        if model.syseleven_realm().is_some() {
            model.oidc_kube_config = kubeconfig_or_warn(
                "OIDC kubeconfig",
                self.client.oidc_kubeconfig(project, id).await,
                prior.oidc_kube_config.as_ref(),
                &mut diagnostics,
            );
            model.kube_login_kube_config = kubeconfig_or_warn(
                "kubelogin kubeconfig",
                self.client.kubelogin_kubeconfig(project, id).await,
                prior.kube_login_kube_config.as_ref(),
                &mut diagnostics,
            );
        }

        Ok(Response {
            state: Some(model),
            diagnostics,
        })
    }

    /// Reads back after a mutation. A failed wait still returns the
    /// refreshed state, with the failure appended as an error.
    async fn settle(
        &self,
        ctx: &OperationContext,
        project: &str,
        id: &str,
        prior: &ClusterModel,
        outcome: Result<()>,
        diagnostics: Diagnostics,
    ) -> Result<Response<ClusterModel>> {
        let response = match outcome {
            Ok(()) => self.refresh(project, id, prior).await?,
            Err(e) if ctx.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("Cluster {id} did not settle: {e}");
                match self.refresh(project, id, prior).await {
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

    async fn assign_sshkeys(&self, project: &str, id: &str, keys: &BTreeSet<String>) -> Result<()> {
        for key in keys {
            debug!("Assigning SSH key {key} to cluster {id}");
            self.client.assign_sshkey(project, id, key).await?;
        }
        Ok(())
    }

    async fn reconcile_sshkeys(
        &self,
        project: &str,
        id: &str,
        prior: &BTreeSet<String>,
        plan: &BTreeSet<String>,
    ) -> Result<()> {
        for key in prior.difference(plan) {
            debug!("Detaching SSH key {key} from cluster {id}");
            if let Err(e) = self.client.detach_sshkey(project, id, key).await {
                if !e.is_not_found() {
                    return Err(e);
                }
            }
        }
        for key in plan.difference(prior) {
            debug!("Assigning SSH key {key} to cluster {id}");
            if let Err(e) = self.client.assign_sshkey(project, id, key).await {
                if !e.is_not_found() {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Sends the patch, retrying on conflicts within the conflict window.
    async fn patch_with_conflicts(
        &self,
        ctx: &OperationContext,
        project: &str,
        id: &str,
        patch: &ClusterPatch,
    ) -> Result<()> {
        let ticker = Ticker::new(ctx, self.poll.conflict_window, self.poll.conflict_sleep);

        loop {
            let cause = match self.client.patch_cluster(project, id, patch).await {
                Ok(_) => {
                    info!("Cluster {id} patched");
                    return Ok(());
                }
                Err(e) if e.is_conflict() => e,
                Err(e) => return Err(e),
            };

            debug!("Patch of cluster {id} conflicted: {cause}");
            match ticker.tick().await {
                Tick::Continue => {}
                Tick::Expired => {
                    return Err(MetaKubeError::Timeout {
                        cause: Box::new(cause),
                    });
                }
                Tick::Cancelled => {
                    return Err(MetaKubeError::Cancelled {
                        cause: Box::new(cause),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Resource for ClusterResource {
    type Model = ClusterModel;

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    async fn create(&self, ctx: &OperationContext, plan: ClusterModel) -> Result<Response<ClusterModel>> {
        let timeout = Timeouts::create_or(plan.timeouts.as_ref(), TimeoutDefaults::CLUSTER)?;
        let project = plan
            .project()
            .ok_or_else(|| {
                ConfigError::validation("project_id is required to create a cluster", "project_id")
            })?
            .to_string();

        let diagnostics = ClusterValidator::new(&self.client)
            .validate_create(&plan)
            .await?
            .into_result()?;

        info!("Creating cluster {} in project {project}", plan.name);
        let created = self
            .client
            .create_cluster(&project, &expand_cluster(&plan))
            .await?;
        if created.id.is_empty() {
            return Err(MetaKubeError::InvalidResponse {
                operation: String::from("create cluster"),
                message: String::from("response carries no cluster id"),
            });
        }
        let id = created.id;
        info!("Cluster {id} created");

        let mut state = plan.clone();
        state.id = Some(id.clone());
        state.project_id = Some(project.clone());

        let outcome = async {
            self.assign_sshkeys(&project, &id, &plan.sshkeys).await?;
            wait_for_cluster_ready(
                &self.client,
                ctx,
                &self.poll,
                &project,
                &id,
                Some(plan.spec.version.as_str()),
                timeout,
            )
            .await
        }
        .await;

        self.settle(ctx, &project, &id, &state, outcome, diagnostics)
            .await
    }

    async fn read(&self, _ctx: &OperationContext, state: ClusterModel) -> Result<Response<ClusterModel>> {
        let Some(id) = state.cluster_id() else {
            return Ok(Response::removed());
        };

        let project = match state.project() {
            Some(project) => project.to_string(),
            None => {
                if let Some(project) = find_cluster_project(&self.client, id).await? {
                    project
                } else {
                    warn!("Cluster {id} not found in any project, removing it from state");
                    return Ok(Response::removed());
                }
            }
        };

        self.refresh(&project, id, &state).await
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        prior: ClusterModel,
        plan: ClusterModel,
    ) -> Result<Response<ClusterModel>> {
        ensure_in_place(&SCHEMA, &prior, &plan)?;

        let id = prior
            .cluster_id()
            .ok_or_else(|| MetaKubeError::internal("cluster id is not set"))?
            .to_string();
        let project = resolve_project(&self.client, prior.project(), &id).await?;

        let mut target = plan.clone();
        target.id = Some(id.clone());
        target.project_id = Some(project.clone());

        let changes = ChangeSet::between(&prior, &plan)?;
        let patch = cluster_patch(&prior, &plan, &changes);
        if patch.is_empty() && prior.sshkeys == plan.sshkeys {
            debug!("Cluster {id} is up to date");
            return self.refresh(&project, &id, &target).await;
        }

        let timeout = Timeouts::update_or(plan.timeouts.as_ref(), TimeoutDefaults::CLUSTER)?;
        let diagnostics = ClusterValidator::new(&self.client)
            .validate_update(&project, &id, &prior, &plan)
            .await?
            .into_result()?;

        info!("Updating cluster {id}");
        let outcome = async {
            if !patch.is_empty() {
                self.patch_with_conflicts(ctx, &project, &id, &patch).await?;
            }
            self.reconcile_sshkeys(&project, &id, &prior.sshkeys, &plan.sshkeys)
                .await?;
            wait_for_cluster_ready(
                &self.client,
                ctx,
                &self.poll,
                &project,
                &id,
                Some(plan.spec.version.as_str()),
                timeout,
            )
            .await
        }
        .await;

        self.settle(ctx, &project, &id, &target, outcome, diagnostics)
            .await
    }

    async fn delete(&self, ctx: &OperationContext, state: ClusterModel) -> Result<Diagnostics> {
        let Some(id) = state.cluster_id() else {
            return Ok(Diagnostics::new());
        };
        let project = match state.project() {
            Some(project) => project.to_string(),
            None => match find_cluster_project(&self.client, id).await? {
                Some(project) => project,
                None => return Ok(Diagnostics::new()),
            },
        };

        let timeout = Timeouts::delete_or(state.timeouts.as_ref(), TimeoutDefaults::CLUSTER)?;
        let ticker = Ticker::new(ctx, timeout, self.poll.delete_tick);
        let mut accepted = false;

        info!("Deleting cluster {id}");
        loop {
            if accepted {
                match self.client.get_cluster(&project, id).await {
                    Err(e) if e.is_not_found() => break,
                    Err(e) if e.is_transient() || e.is_forbidden() => {
                        debug!("Polling deleted cluster {id}: {e}");
                    }
                    Err(e) => return Err(e),
                    Ok(_) => debug!("Cluster {id} is still being deleted"),
                }
            } else {
                match self.client.delete_cluster(&project, id).await {
                    Ok(()) => {
                        debug!("Deletion of cluster {id} accepted");
                        accepted = true;
                        continue;
                    }
                    Err(e) if e.is_gone() => break,
                    Err(e) if e.is_conflict() => {
                        debug!("Cluster {id} still has dependents: {e}");
                    }
                    Err(e) => return Err(e),
                }
            }

            match ticker.tick().await {
                Tick::Continue => {}
                Tick::Expired => {
                    return Err(MetaKubeError::Timeout {
                        cause: Box::new(MetaKubeError::not_ready(format!(
                            "cluster {id} still exists"
                        ))),
                    });
                }
                Tick::Cancelled => return Err(MetaKubeError::OperationCancelled),
            }
        }

        info!("Cluster {id} deleted");
        Ok(Diagnostics::new())
    }

    async fn import(&self, ctx: &OperationContext, id: &str) -> Result<Response<ClusterModel>> {
        let (project, cluster_id) = parse_cluster_id(id)?;
        let project = resolve_project(&self.client, project.as_deref(), &cluster_id).await?;

        let state = ClusterModel {
            id: Some(cluster_id.clone()),
            project_id: Some(project),
            ..ClusterModel::default()
        };
        let response = self.read(ctx, state).await?;
        if response.state.is_none() {
            return Err(ImportError::OwnerNotFound {
                what: "cluster",
                id: cluster_id,
            }
            .into());
        }
        Ok(response)
    }
}
