//! Resource schemas and typed models.
//!
//! Each resource declares an attribute table. The tables drive the generic
//! passes that run over the JSON form of a model before it is decoded into
//! its typed struct:
//!
//! - [`Schema::apply_defaults`] fills literal, environment and prior-state defaults
//! - [`Schema::check`] reports missing required attributes and type mismatches
//! - [`Schema::requires_replacement`] lists force-new attributes that changed
//! - [`Schema::redact`] masks sensitive attributes before logging or printing

pub mod bindings;
pub mod cluster;
pub mod node_deployment;
pub mod project;
pub mod sshkey;
pub mod timeouts;

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{MetaKubeError, Result};

pub use bindings::{ClusterRoleBindingModel, RoleBindingModel, SubjectModel, SubjectKindModel};
pub use cluster::ClusterModel;
pub use node_deployment::NodeDeploymentModel;
pub use project::ProjectModel;
pub use sshkey::SshKeyModel;
pub use timeouts::Timeouts;

/// Placeholder written in place of sensitive values.
pub const REDACTED: &str = "<sensitive>";

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// String.
    String,
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// Ordered list.
    List,
    /// Unordered set of strings.
    Set,
    /// String to string map.
    Map,
    /// Nested block.
    Block,
}

impl AttrType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::List => value.is_array(),
            Self::Set => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::Map => value
                .as_object()
                .is_some_and(|entries| entries.values().all(Value::is_string)),
            Self::Block => value.is_object(),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "number",
            Self::List => "list",
            Self::Set => "set of string",
            Self::Map => "map of string",
            Self::Block => "block",
        };
        f.write_str(name)
    }
}

/// Whether an attribute is supplied by the user, the server, or either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Must be set whenever the enclosing block is present.
    Required,
    /// May be set.
    Optional,
    /// Set by the provider only.
    Computed,
    /// May be set; filled by the provider otherwise.
    OptionalComputed,
}

/// Source of a default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// Literal string.
    Str(&'static str),
    /// Literal boolean.
    Bool(bool),
    /// First non-empty environment variable among the names.
    Env(&'static [&'static str]),
    /// Value recorded in prior state, when the plan leaves it empty.
    PriorState,
}

/// One entry of a schema's attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    /// Dotted path from the model root.
    pub path: &'static str,
    /// Semantic type.
    pub kind: AttrType,
    /// Disposition.
    pub disposition: Disposition,
    /// Whether the value is a credential or a kubeconfig.
    pub sensitive: bool,
    /// Whether a change requires replacing the remote object.
    pub force_new: bool,
    /// Default value source.
    pub default: Option<DefaultValue>,
}

impl Attribute {
    const fn new(path: &'static str, kind: AttrType, disposition: Disposition) -> Self {
        Self {
            path,
            kind,
            disposition,
            sensitive: false,
            force_new: false,
            default: None,
        }
    }

    /// Required attribute.
    #[must_use]
    pub const fn required(path: &'static str, kind: AttrType) -> Self {
        Self::new(path, kind, Disposition::Required)
    }

    /// Optional attribute.
    #[must_use]
    pub const fn optional(path: &'static str, kind: AttrType) -> Self {
        Self::new(path, kind, Disposition::Optional)
    }

    /// Computed attribute.
    #[must_use]
    pub const fn computed(path: &'static str, kind: AttrType) -> Self {
        Self::new(path, kind, Disposition::Computed)
    }

    /// Optional attribute filled by the provider when unset.
    #[must_use]
    pub const fn optional_computed(path: &'static str, kind: AttrType) -> Self {
        Self::new(path, kind, Disposition::OptionalComputed)
    }

    /// Marks the attribute sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Marks the attribute force-new.
    #[must_use]
    pub const fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Sets the default value source.
    #[must_use]
    pub const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// Attribute table of one resource type.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Orchestrator type name, e.g. `metakube_cluster`.
    pub type_name: &'static str,
    /// Attributes, parents before children.
    pub attributes: &'static [Attribute],
}

/// Reads a process environment variable.
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Environment lookup that never finds anything.
#[cfg(test)]
pub(crate) fn no_env(_: &str) -> Option<String> {
    None
}

/// Returns the value at a dotted path.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

fn lookup_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get_mut(segment))
}

/// Returns true for `null`, absent-equivalent empty strings, and empty collections.
#[must_use]
pub fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(entries)) => entries.is_empty(),
        Some(_) => false,
    }
}

fn split_parent(path: &str) -> (Option<&str>, &str) {
    path.rsplit_once('.')
        .map_or((None, path), |(parent, leaf)| (Some(parent), leaf))
}

fn parent_object_mut<'a>(value: &'a mut Value, path: &str) -> Option<(&'a mut Map<String, Value>, String)> {
    let (parent, leaf) = split_parent(path);
    let object = match parent {
        Some(parent) => lookup_mut(value, parent)?,
        None => value,
    };
    object.as_object_mut().map(|map| (map, leaf.to_string()))
}

fn parent_present(value: &Value, path: &str) -> bool {
    match split_parent(path).0 {
        Some(parent) => lookup(value, parent).is_some_and(Value::is_object),
        None => value.is_object(),
    }
}

impl Schema {
    /// Returns the attribute at `path`.
    #[must_use]
    pub fn attribute(&self, path: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.path == path)
    }

    /// Fills defaults for attributes left unset.
    ///
    /// Defaults are applied only when the enclosing block exists, so an
    /// environment variable never conjures a block the user did not write.
    pub fn apply_defaults(
        &self,
        value: &mut Value,
        prior: Option<&Value>,
        env: &dyn Fn(&str) -> Option<String>,
    ) {
        for attribute in self.attributes {
            let Some(default) = attribute.default else {
                continue;
            };
            if !is_unset(lookup(value, attribute.path)) {
                continue;
            }

            let filled = match default {
                DefaultValue::Str(s) => Some(Value::String(s.to_string())),
                DefaultValue::Bool(b) => Some(Value::Bool(b)),
                DefaultValue::Env(names) => names
                    .iter()
                    .filter_map(|name| env(name))
                    .find(|v| !v.is_empty())
                    .map(Value::String),
                DefaultValue::PriorState => prior
                    .and_then(|p| lookup(p, attribute.path))
                    .filter(|v| !is_unset(Some(v)))
                    .cloned(),
            };

            if let (Some(filled), Some((object, leaf))) =
                (filled, parent_object_mut(value, attribute.path))
            {
                object.insert(leaf, filled);
            }
        }
    }

    /// Checks required attributes and attribute types.
    #[must_use]
    pub fn check(&self, value: &Value) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        for attribute in self.attributes {
            if !parent_present(value, attribute.path) {
                continue;
            }

            match lookup(value, attribute.path) {
                None | Some(Value::Null) => {
                    if attribute.disposition == Disposition::Required {
                        diagnostics.error_at(
                            attribute.path,
                            "Missing required argument",
                            format!("The argument \"{}\" is required.", attribute.path),
                        );
                    }
                }
                Some(found) if !attribute.kind.matches(found) => {
                    diagnostics.error_at(
                        attribute.path,
                        "Incorrect attribute value type",
                        format!("Inappropriate value for \"{}\": {} required.", attribute.path, attribute.kind),
                    );
                }
                Some(_) => {}
            }
        }

        diagnostics
    }

    /// Lists force-new attributes whose value differs between prior and plan.
    ///
    /// An optional-computed attribute left unset in the plan keeps its prior
    /// value and never triggers replacement.
    #[must_use]
    pub fn requires_replacement(&self, prior: &Value, plan: &Value) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.force_new)
            .filter(|a| {
                let before = lookup(prior, a.path).filter(|v| !is_unset(Some(v)));
                let after = lookup(plan, a.path).filter(|v| !is_unset(Some(v)));
                if after.is_none() && a.disposition == Disposition::OptionalComputed {
                    return false;
                }
                before != after
            })
            .map(|a| a.path)
            .collect()
    }

    /// Replaces every set sensitive value with [`REDACTED`].
    pub fn redact(&self, value: &mut Value) {
        for attribute in self.attributes.iter().filter(|a| a.sensitive) {
            if let Some(found) = lookup_mut(value, attribute.path) {
                if !is_unset(Some(found)) {
                    *found = Value::String(REDACTED.to_string());
                }
            }
        }
    }

    /// Decodes a raw configuration into a typed model.
    ///
    /// Applies defaults, checks the attribute table, then deserializes.
    ///
    /// # Errors
    ///
    /// Returns [`MetaKubeError::Validation`] with one diagnostic per schema
    /// violation, or when the value does not deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(
        &self,
        mut value: Value,
        prior: Option<&Value>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<T> {
        self.apply_defaults(&mut value, prior, env);
        self.check(&value).into_result()?;
        serde_json::from_value(value).map_err(|e| {
            MetaKubeError::Validation(Diagnostics::from(Diagnostic::error(
                format!("Invalid {} configuration", self.type_name),
                e.to_string(),
            )))
        })
    }

    /// Serializes a model and redacts its sensitive attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be serialized.
    pub fn redacted<T: Serialize>(&self, model: &T) -> Result<Value> {
        let mut value = serde_json::to_value(model)?;
        self.redact(&mut value);
        Ok(value)
    }
}
