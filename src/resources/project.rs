//! `metakube_project` data source.

use tracing::debug;

use crate::api::MetaKubeClient;
use crate::context::OperationContext;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::schema::project::ProjectModel;

use super::Response;

/// Looks projects up by name.
#[derive(Debug, Clone)]
pub struct ProjectDataSource {
    client: MetaKubeClient,
}

impl ProjectDataSource {
    /// Creates a data source.
    #[must_use]
    pub const fn new(client: MetaKubeClient) -> Self {
        Self { client }
    }

    /// Returns the single project called `name`.
    ///
    /// Zero or several matches yield an error diagnostic at `name` and no
    /// state.
    ///
    /// # Errors
    ///
    /// Returns an error if listing projects fails.
    pub async fn read(&self, _ctx: &OperationContext, name: &str) -> Result<Response<ProjectModel>> {
        let mut matches: Vec<ProjectModel> = self
            .client
            .list_projects()
            .await?
            .into_iter()
            .filter(|p| p.name == name)
            .map(ProjectModel::from)
            .collect();
        debug!("{} projects named {name}", matches.len());

        let mut diagnostics = Diagnostics::new();
        match matches.len() {
            1 => Ok(Response::new(matches.remove(0))),
            0 => {
                diagnostics.error_at(
                    "name",
                    "Project not found",
                    format!("No project named {name} is visible to this token."),
                );
                Ok(Response::<ProjectModel>::removed().with_diagnostics(diagnostics))
            }
            n => {
                let ids: Vec<&str> = matches.iter().map(|p| p.id.as_str()).collect();
                diagnostics.error_at(
                    "name",
                    "Ambiguous project name",
                    format!("{n} projects are named {name}: {}", ids.join(", ")),
                );
                Ok(Response::<ProjectModel>::removed().with_diagnostics(diagnostics))
            }
        }
    }
}
