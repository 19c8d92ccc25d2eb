//! `metakube_sshkey` reconciler.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::types::{SshKey, SshKeySpec};
use crate::api::MetaKubeClient;
use crate::context::OperationContext;
use crate::diagnostics::Diagnostics;
use crate::error::{ConfigError, ImportError, MetaKubeError, Result};
use crate::schema::Schema;
use crate::schema::sshkey::{SCHEMA, SshKeyModel, same_public_key};

use super::import::parse_sshkey_id;
use super::{Resource, Response, ensure_in_place};

/// Reconciles project SSH keys.
#[derive(Debug, Clone)]
pub struct SshKeyResource {
    client: MetaKubeClient,
}

impl SshKeyResource {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(client: MetaKubeClient) -> Self {
        Self { client }
    }

    /// Scans projects for the one holding key `id`.
    async fn find_project(&self, id: &str) -> Result<Option<String>> {
        for project in self.client.list_projects().await? {
            match self.client.list_sshkeys(&project.id).await {
                Ok(keys) if keys.iter().any(|k| k.id == id) => return Ok(Some(project.id)),
                Ok(_) => {}
                Err(e) if e.is_gone() => debug!("Skipping project {}: {e}", project.id),
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn project_of(&self, state: &SshKeyModel, id: &str) -> Result<Option<String>> {
        match state.project() {
            Some(project) => Ok(Some(project.to_string())),
            None => self.find_project(id).await,
        }
    }
}

/// Builds state from a server key, keeping the prior key text when the two
/// only differ in surrounding whitespace.
fn flatten(project: &str, key: SshKey, prior: &SshKeyModel) -> SshKeyModel {
    let public_key = if same_public_key(&prior.public_key, &key.spec.public_key) {
        prior.public_key.clone()
    } else {
        key.spec.public_key
    };

    SshKeyModel {
        id: Some(key.id),
        project_id: Some(project.to_string()),
        name: key.name,
        public_key,
    }
}

#[async_trait]
impl Resource for SshKeyResource {
    type Model = SshKeyModel;

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    async fn create(&self, _ctx: &OperationContext, plan: SshKeyModel) -> Result<Response<SshKeyModel>> {
        let project = plan.project().ok_or_else(|| {
            ConfigError::validation("project_id is required to create an SSH key", "project_id")
        })?;

        info!("Creating SSH key {} in project {project}", plan.name);
        let created = self
            .client
            .create_sshkey(
                project,
                &SshKey {
                    name: plan.name.clone(),
                    spec: SshKeySpec {
                        public_key: plan.public_key.clone(),
                        ..SshKeySpec::default()
                    },
                    ..SshKey::default()
                },
            )
            .await?;
        info!("SSH key {} created", created.id);

        Ok(Response::new(flatten(project, created, &plan)))
    }

    async fn read(&self, _ctx: &OperationContext, state: SshKeyModel) -> Result<Response<SshKeyModel>> {
        let Some(id) = state.key_id() else {
            return Ok(Response::removed());
        };
        let Some(project) = self.project_of(&state, id).await? else {
            warn!("SSH key {id} not found in any project, removing it from state");
            return Ok(Response::removed());
        };

        let keys = match self.client.list_sshkeys(&project).await {
            Ok(keys) => keys,
            Err(e) if e.is_gone() => return Ok(Response::removed()),
            Err(e) => return Err(e),
        };

        match keys.into_iter().find(|k| k.id == id) {
            Some(key) => Ok(Response::new(flatten(&project, key, &state))),
            None => {
                warn!("SSH key {id} not found, removing it from state");
                Ok(Response::removed())
            }
        }
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        prior: SshKeyModel,
        mut plan: SshKeyModel,
    ) -> Result<Response<SshKeyModel>> {
        if same_public_key(&prior.public_key, &plan.public_key) {
            plan.public_key.clone_from(&prior.public_key);
        }
        ensure_in_place(&SCHEMA, &prior, &plan)?;
        self.read(ctx, prior).await
    }

    async fn delete(&self, _ctx: &OperationContext, state: SshKeyModel) -> Result<Diagnostics> {
        let Some(id) = state.key_id() else {
            return Ok(Diagnostics::new());
        };
        let Some(project) = self.project_of(&state, id).await? else {
            return Ok(Diagnostics::new());
        };

        info!("Deleting SSH key {id}");
        match self.client.delete_sshkey(&project, id).await {
            Ok(()) => Ok(Diagnostics::new()),
            Err(e) if e.is_gone() => Ok(Diagnostics::new()),
            Err(e) => Err(e),
        }
    }

    async fn import(&self, ctx: &OperationContext, id: &str) -> Result<Response<SshKeyModel>> {
        let (project, key) = parse_sshkey_id(id)?;
        let state = SshKeyModel {
            id: Some(key.clone()),
            project_id: project,
            ..SshKeyModel::default()
        };

        let response = self.read(ctx, state).await?;
        if response.state.is_none() {
            return Err(MetaKubeError::from(ImportError::OwnerNotFound {
                what: "SSH key",
                id: key,
            }));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_keeps_equivalent_prior_text() {
        let prior = SshKeyModel {
            public_key: String::from("ssh-ed25519 AAAA me\n"),
            ..SshKeyModel::default()
        };
        let key = SshKey {
            id: String::from("k1"),
            name: String::from("laptop"),
            spec: SshKeySpec {
                public_key: String::from("ssh-ed25519 AAAA me"),
                ..SshKeySpec::default()
            },
            ..SshKey::default()
        };

        let model = flatten("p", key, &prior);
        assert_eq!(model.public_key, "ssh-ed25519 AAAA me\n");
        assert_eq!(model.id.as_deref(), Some("k1"));
        assert_eq!(model.project_id.as_deref(), Some("p"));
    }
}
