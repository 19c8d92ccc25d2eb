//! `metakube_role_binding` and `metakube_cluster_role_binding` models and schemas.

use serde::{Deserialize, Serialize};

use crate::api::types::SubjectKind;

use super::{AttrType, Attribute, Schema};

/// Kind of a binding subject as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKindModel {
    /// A user, identified by e-mail.
    User,
    /// A group.
    Group,
}

impl From<SubjectKindModel> for SubjectKind {
    fn from(kind: SubjectKindModel) -> Self {
        match kind {
            SubjectKindModel::User => Self::User,
            SubjectKindModel::Group => Self::Group,
        }
    }
}

impl From<SubjectKind> for SubjectKindModel {
    fn from(kind: SubjectKind) -> Self {
        match kind {
            SubjectKind::User => Self::User,
            SubjectKind::Group => Self::Group,
        }
    }
}

/// A binding subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectModel {
    /// `user` or `group`.
    pub kind: SubjectKindModel,
    /// User e-mail or group name.
    pub name: String,
}

/// A namespaced role binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBindingModel {
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Cluster.
    pub cluster_id: String,
    /// Namespace of the role.
    pub namespace: String,
    /// Role name.
    pub role_name: String,
    /// Bound subjects.
    #[serde(default)]
    pub subjects: Vec<SubjectModel>,
}

/// A cluster-wide role binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRoleBindingModel {
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Cluster.
    pub cluster_id: String,
    /// Cluster role name.
    pub cluster_role_name: String,
    /// Bound subjects.
    #[serde(default)]
    pub subjects: Vec<SubjectModel>,
}

/// Attribute table of `metakube_role_binding`.
pub const ROLE_BINDING_SCHEMA: Schema = Schema {
    type_name: "metakube_role_binding",
    attributes: &[
        Attribute::required("project_id", AttrType::String).force_new(),
        Attribute::required("cluster_id", AttrType::String).force_new(),
        Attribute::required("namespace", AttrType::String).force_new(),
        Attribute::required("role_name", AttrType::String).force_new(),
        Attribute::required("subjects", AttrType::List).force_new(),
    ],
};

/// Attribute table of `metakube_cluster_role_binding`.
pub const CLUSTER_ROLE_BINDING_SCHEMA: Schema = Schema {
    type_name: "metakube_cluster_role_binding",
    attributes: &[
        Attribute::required("project_id", AttrType::String).force_new(),
        Attribute::required("cluster_id", AttrType::String).force_new(),
        Attribute::required("cluster_role_name", AttrType::String).force_new(),
        Attribute::required("subjects", AttrType::List).force_new(),
    ],
};
