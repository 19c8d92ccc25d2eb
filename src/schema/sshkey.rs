//! `metakube_sshkey` model and schema.

use serde::{Deserialize, Serialize};

use super::{AttrType, Attribute, Schema};

/// A project SSH key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyModel {
    /// Key id; empty until created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Key name.
    pub name: String,
    /// Public key in authorized_keys format.
    pub public_key: String,
}

impl SshKeyModel {
    /// Returns the project id when it is known.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project_id.as_deref().filter(|p| !p.is_empty())
    }

    /// Returns the key id when it is known.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Compares public keys ignoring surrounding whitespace.
#[must_use]
pub fn same_public_key(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// Attribute table of `metakube_sshkey`.
pub const SCHEMA: Schema = Schema {
    type_name: "metakube_sshkey",
    attributes: &[
        Attribute::computed("id", AttrType::String),
        Attribute::optional_computed("project_id", AttrType::String).force_new(),
        Attribute::required("name", AttrType::String).force_new(),
        Attribute::required("public_key", AttrType::String).force_new(),
    ],
};
