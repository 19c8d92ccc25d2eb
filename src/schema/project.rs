//! `metakube_project` data source model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::types::Project;

use super::{AttrType, Attribute, Schema};

/// A project looked up by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectModel {
    /// Project id.
    pub id: String,
    /// Project name.
    pub name: String,
    /// Project phase.
    #[serde(default)]
    pub status: String,
    /// Project labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl From<Project> for ProjectModel {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
            status: project.status,
            labels: project.labels,
        }
    }
}

/// Attribute table of the `metakube_project` data source.
pub const SCHEMA: Schema = Schema {
    type_name: "metakube_project",
    attributes: &[
        Attribute::required("name", AttrType::String),
        Attribute::computed("id", AttrType::String),
        Attribute::computed("status", AttrType::String),
        Attribute::computed("labels", AttrType::Map),
    ],
};
