//! API token resolution.
//!
//! The token is either configured inline or read from a file whose path may
//! start with `~`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AuthError, Result};

/// Resolves the bearer token used for every API request.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    token: Option<String>,
    token_path: Option<String>,
}

impl Authenticator {
    /// Creates an authenticator from the configured token sources.
    #[must_use]
    pub fn new(token: Option<String>, token_path: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            token_path: token_path.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Returns the bearer token.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] reported against `token` and `token_path` when
    /// neither yields a non-empty token, or when the token file cannot be read.
    pub fn token(&self) -> Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.trim().to_string());
        }

        let Some(raw_path) = &self.token_path else {
            return Err(AuthError::missing_token(
                "either token or token_path must be set",
            )
            .into());
        };

        let path = expand_home(raw_path);
        debug!("Reading API token from {}", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            AuthError::missing_token(format!(
                "failed to read token file {}: {e}",
                path.display()
            ))
        })?;

        let token = contents.trim();
        if token.is_empty() {
            return Err(
                AuthError::missing_token(format!("token file {} is empty", path.display())).into(),
            );
        }

        Ok(token.to_string())
    }
}

/// Expands a leading `~` to the user's home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }

    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(path).to_path_buf(),
    }
}
