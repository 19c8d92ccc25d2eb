//! `metakube_role_binding` and `metakube_cluster_role_binding` reconcilers.
//!
//! A binding has no id of its own: it is the set of subjects attached to one
//! role. Creating binds each subject, deleting unbinds each of them, and a
//! read keeps only the subjects the server still reports.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::MetaKubeClient;
use crate::api::types::{RoleUser, Subject};
use crate::context::OperationContext;
use crate::diagnostics::Diagnostics;
use crate::error::{ImportError, MetaKubeError, Result};
use crate::schema::Schema;
use crate::schema::bindings::{
    CLUSTER_ROLE_BINDING_SCHEMA, ClusterRoleBindingModel, ROLE_BINDING_SCHEMA, RoleBindingModel,
    SubjectModel,
};

use super::import::{parse_cluster_role_binding_id, parse_role_binding_id};
use super::{Resource, Response, ensure_in_place, resolve_project};

/// Orders server subjects like `prior`, appending ones the prior state did
/// not know about.
fn merge_subjects(prior: &[SubjectModel], server: &[Subject]) -> Vec<SubjectModel> {
    let server: Vec<SubjectModel> = server
        .iter()
        .map(|s| SubjectModel {
            kind: s.kind.into(),
            name: s.name.clone(),
        })
        .collect();

    let mut merged: Vec<SubjectModel> = prior
        .iter()
        .filter(|s| server.contains(s))
        .cloned()
        .collect();
    for subject in server {
        if !merged.contains(&subject) {
            merged.push(subject);
        }
    }
    merged
}

fn body(subject: &SubjectModel) -> RoleUser {
    RoleUser::for_subject(subject.kind.into(), &subject.name)
}

/// Reconciles namespaced role bindings.
#[derive(Debug, Clone)]
pub struct RoleBindingResource {
    client: MetaKubeClient,
}

impl RoleBindingResource {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(client: MetaKubeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for RoleBindingResource {
    type Model = RoleBindingModel;

    fn schema(&self) -> &'static Schema {
        &ROLE_BINDING_SCHEMA
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        mut plan: RoleBindingModel,
    ) -> Result<Response<RoleBindingModel>> {
        let project = resolve_project(&self.client, plan.project_id.as_deref(), &plan.cluster_id).await?;
        plan.project_id = Some(project.clone());

        info!(
            "Binding {} subjects to role {}/{} in cluster {}",
            plan.subjects.len(),
            plan.namespace,
            plan.role_name,
            plan.cluster_id
        );
        for subject in &plan.subjects {
            self.client
                .bind_role(&project, &plan.cluster_id, &plan.namespace, &plan.role_name, &body(subject))
                .await?;
        }

        self.read(ctx, plan).await
    }

    async fn read(
        &self,
        _ctx: &OperationContext,
        state: RoleBindingModel,
    ) -> Result<Response<RoleBindingModel>> {
        let project = resolve_project(&self.client, state.project_id.as_deref(), &state.cluster_id).await?;

        let bindings = match self.client.list_role_bindings(&project, &state.cluster_id).await {
            Ok(bindings) => bindings,
            Err(e) if e.is_gone() => return Ok(Response::removed()),
            Err(e) => return Err(e),
        };

        let subjects: Vec<Subject> = bindings
            .into_iter()
            .filter(|b| b.namespace == state.namespace && b.role_ref_name == state.role_name)
            .flat_map(|b| b.subjects)
            .collect();
        if subjects.is_empty() {
            warn!(
                "Role binding {}/{} not found in cluster {}, removing it from state",
                state.namespace, state.role_name, state.cluster_id
            );
            return Ok(Response::removed());
        }

        Ok(Response::new(RoleBindingModel {
            project_id: Some(project),
            subjects: merge_subjects(&state.subjects, &subjects),
            ..state
        }))
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        prior: RoleBindingModel,
        plan: RoleBindingModel,
    ) -> Result<Response<RoleBindingModel>> {
        ensure_in_place(&ROLE_BINDING_SCHEMA, &prior, &plan)?;
        self.read(ctx, prior).await
    }

    async fn delete(&self, _ctx: &OperationContext, state: RoleBindingModel) -> Result<Diagnostics> {
        let project = resolve_project(&self.client, state.project_id.as_deref(), &state.cluster_id).await?;

        for subject in &state.subjects {
            info!("Unbinding {} from role {}/{}", subject.name, state.namespace, state.role_name);
            match self
                .client
                .unbind_role(&project, &state.cluster_id, &state.namespace, &state.role_name, &body(subject))
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_gone() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Diagnostics::new())
    }

    async fn import(&self, ctx: &OperationContext, id: &str) -> Result<Response<RoleBindingModel>> {
        let [project, cluster_id, namespace, role_name] = parse_role_binding_id(id)?;
        let state = RoleBindingModel {
            project_id: Some(project),
            cluster_id,
            namespace,
            role_name,
            subjects: Vec::new(),
        };

        let response = self.read(ctx, state).await?;
        if response.state.is_none() {
            return Err(MetaKubeError::from(ImportError::OwnerNotFound {
                what: "role binding",
                id: id.to_string(),
            }));
        }
        Ok(response)
    }
}

/// Reconciles cluster-wide role bindings.
#[derive(Debug, Clone)]
pub struct ClusterRoleBindingResource {
    client: MetaKubeClient,
}

impl ClusterRoleBindingResource {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(client: MetaKubeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for ClusterRoleBindingResource {
    type Model = ClusterRoleBindingModel;

    fn schema(&self) -> &'static Schema {
        &CLUSTER_ROLE_BINDING_SCHEMA
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        mut plan: ClusterRoleBindingModel,
    ) -> Result<Response<ClusterRoleBindingModel>> {
        let project = resolve_project(&self.client, plan.project_id.as_deref(), &plan.cluster_id).await?;
        plan.project_id = Some(project.clone());

        info!(
            "Binding {} subjects to cluster role {} in cluster {}",
            plan.subjects.len(),
            plan.cluster_role_name,
            plan.cluster_id
        );
        for subject in &plan.subjects {
            self.client
                .bind_cluster_role(&project, &plan.cluster_id, &plan.cluster_role_name, &body(subject))
                .await?;
        }

        self.read(ctx, plan).await
    }

    async fn read(
        &self,
        _ctx: &OperationContext,
        state: ClusterRoleBindingModel,
    ) -> Result<Response<ClusterRoleBindingModel>> {
        let project = resolve_project(&self.client, state.project_id.as_deref(), &state.cluster_id).await?;

        let bindings = match self
            .client
            .list_cluster_role_bindings(&project, &state.cluster_id)
            .await
        {
            Ok(bindings) => bindings,
            Err(e) if e.is_gone() => return Ok(Response::removed()),
            Err(e) => return Err(e),
        };

        let subjects: Vec<Subject> = bindings
            .into_iter()
            .filter(|b| b.role_ref_name == state.cluster_role_name)
            .flat_map(|b| b.subjects)
            .collect();
        if subjects.is_empty() {
            warn!(
                "Cluster role binding {} not found in cluster {}, removing it from state",
                state.cluster_role_name, state.cluster_id
            );
            return Ok(Response::removed());
        }

        Ok(Response::new(ClusterRoleBindingModel {
            project_id: Some(project),
            subjects: merge_subjects(&state.subjects, &subjects),
            ..state
        }))
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        prior: ClusterRoleBindingModel,
        plan: ClusterRoleBindingModel,
    ) -> Result<Response<ClusterRoleBindingModel>> {
        ensure_in_place(&CLUSTER_ROLE_BINDING_SCHEMA, &prior, &plan)?;
        self.read(ctx, prior).await
    }

    async fn delete(&self, _ctx: &OperationContext, state: ClusterRoleBindingModel) -> Result<Diagnostics> {
        let project = resolve_project(&self.client, state.project_id.as_deref(), &state.cluster_id).await?;

        for subject in &state.subjects {
            info!("Unbinding {} from cluster role {}", subject.name, state.cluster_role_name);
            match self
                .client
                .unbind_cluster_role(&project, &state.cluster_id, &state.cluster_role_name, &body(subject))
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_gone() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Diagnostics::new())
    }

    async fn import(
        &self,
        ctx: &OperationContext,
        id: &str,
    ) -> Result<Response<ClusterRoleBindingModel>> {
        let [project, cluster_id, cluster_role_name] = parse_cluster_role_binding_id(id)?;
        let state = ClusterRoleBindingModel {
            project_id: Some(project),
            cluster_id,
            cluster_role_name,
            subjects: Vec::new(),
        };

        let response = self.read(ctx, state).await?;
        if response.state.is_none() {
            return Err(MetaKubeError::from(ImportError::OwnerNotFound {
                what: "cluster role binding",
                id: id.to_string(),
            }));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::SubjectKind;
    use crate::schema::bindings::SubjectKindModel;

    fn subject(kind: SubjectKind, name: &str) -> Subject {
        Subject {
            kind,
            name: name.to_string(),
            api_group: String::new(),
        }
    }

    fn model(kind: SubjectKindModel, name: &str) -> SubjectModel {
        SubjectModel {
            kind,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_merge_keeps_prior_order_and_appends_new() {
        let prior = vec![
            model(SubjectKindModel::Group, "devs"),
            model(SubjectKindModel::User, "gone@example.com"),
            model(SubjectKindModel::User, "a@example.com"),
        ];
        let server = vec![
            subject(SubjectKind::User, "a@example.com"),
            subject(SubjectKind::User, "new@example.com"),
            subject(SubjectKind::Group, "devs"),
        ];

        let merged = merge_subjects(&prior, &server);
        assert_eq!(
            merged,
            vec![
                model(SubjectKindModel::Group, "devs"),
                model(SubjectKindModel::User, "a@example.com"),
                model(SubjectKindModel::User, "new@example.com"),
            ]
        );
    }

    #[test]
    fn test_body_matches_subject_kind() {
        let user = body(&model(SubjectKindModel::User, "a@example.com"));
        assert_eq!(user.user_email.as_deref(), Some("a@example.com"));
        assert!(user.group.is_none());

        let group = body(&model(SubjectKindModel::Group, "devs"));
        assert_eq!(group.group.as_deref(), Some("devs"));
    }
}
