//! Provider configuration model.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{Authenticator, DEFAULT_REQUEST_TIMEOUT_SECS, MetaKubeClient};
use crate::diagnostics::Diagnostics;
use crate::error::Result;

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Settings shared by every resource of one provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL, e.g. `https://metakube.syseleven.de`.
    #[serde(default)]
    pub host: String,

    /// Inline API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Path of a file holding the API token; `~` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_path: Option<String>,

    /// Development mode: debug logging.
    #[serde(default)]
    pub development: bool,

    /// Debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Optional file receiving JSON log lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: None,
            token_path: None,
            development: false,
            debug: false,
            log_path: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn is_set(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl ProviderConfig {
    /// Returns true when logs should include debug events.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.development || self.debug
    }

    /// Returns the per-request HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks the configuration without touching the network.
    #[must_use]
    pub fn check(&self) -> Diagnostics {
        let mut out = Diagnostics::new();

        if self.host.trim().is_empty() {
            out.error_at("host", "Missing host", "The MetaKube API URL must be set.");
        } else {
            match reqwest::Url::parse(&self.host) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => out.error_at(
                    "host",
                    "Invalid host",
                    format!("host must use http or https, got {:?}", url.scheme()),
                ),
                Err(e) => out.error_at("host", "Invalid host", format!("{:?}: {e}", self.host)),
            }
        }

        match (is_set(self.token.as_ref()), is_set(self.token_path.as_ref())) {
            (true, true) => out.error_at(
                "token",
                "Conflicting token sources",
                "Only one of token and token_path may be set.",
            ),
            (false, false) => out.error_at(
                "token",
                "Missing token",
                "Either token or token_path must be set.",
            ),
            _ => {}
        }

        if self.request_timeout_secs == 0 {
            out.error_at(
                "request_timeout_secs",
                "Invalid request timeout",
                "The request timeout must be at least one second.",
            );
        }

        out
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every problem with its attribute.
    pub fn validate(&self) -> Result<()> {
        self.check().into_result().map(|_| ())
    }

    /// Builds the API client described by this configuration.
    ///
    /// `host_version` is the orchestrator version reported in the user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the token cannot
    /// be resolved.
    pub fn client(&self, host_version: &str) -> Result<MetaKubeClient> {
        self.validate()?;
        let token = Authenticator::new(self.token.clone(), self.token_path.clone()).token()?;
        MetaKubeClient::new(&self.host, &token, host_version, self.request_timeout())
    }
}
