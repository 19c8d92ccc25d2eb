//! Model and state files.
//!
//! Files are YAML or JSON; both parse through `serde_yaml`.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, MetaKubeError, Result};
use crate::schema::{Schema, process_env};

/// Reads a YAML or JSON document into a JSON value.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_document(path: &Path) -> Result<Value> {
    debug!("Reading document {}", path.display());
    if !path.exists() {
        return Err(MetaKubeError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }));
    }

    let content = std::fs::read_to_string(path)?;
    parse_document(&content, Some(path))
}

/// Parses YAML or JSON text into a JSON value.
///
/// # Errors
///
/// Returns a parse error naming `source`.
pub fn parse_document(content: &str, source: Option<&Path>) -> Result<Value> {
    serde_yaml::from_str(content).map_err(|e| {
        MetaKubeError::Config(ConfigError::ParseError {
            message: format!("document parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })
    })
}

/// Loads a desired-state model: defaults (including environment and prior
/// state) are applied and the attribute table is checked.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails the schema.
pub fn load_plan<T: DeserializeOwned>(schema: &Schema, path: &Path, prior: Option<&Value>) -> Result<T> {
    schema.decode(read_document(path)?, prior, &process_env)
}

/// Loads a recorded state as-is.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not match `T`.
pub fn load_state<T: DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_value(read_document(path)?)?)
}

/// Serializes a state for re-use as a prior state.
///
/// # Errors
///
/// Returns an error if the state cannot be serialized.
pub fn to_value<T: Serialize>(state: &T) -> Result<Value> {
    Ok(serde_json::to_value(state)?)
}
