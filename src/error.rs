//! Error types for the MetaKube provider.
//!
//! This module provides the error hierarchy for every stage of a resource
//! operation: provider configuration, authentication, the MetaKube API,
//! pre-mutation validation, import parsing and bounded waits.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// The main error type for the MetaKube provider.
#[derive(Debug, Error)]
pub enum MetaKubeError {
    /// Provider configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Missing or unreadable API token.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The API answered with a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request never produced an HTTP response (DNS, connect, TLS, body).
    #[error("{operation}: request failed: {source}")]
    Transport {
        /// Name of the API operation.
        operation: String,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a body that could not be decoded.
    #[error("{operation}: invalid response: {message}")]
    InvalidResponse {
        /// Name of the API operation.
        operation: String,
        /// Description of the decoding problem.
        message: String,
    },

    /// One or more attribute-scoped validation failures.
    #[error("Validation failed: {0}")]
    Validation(Diagnostics),

    /// Malformed import identifier or unresolvable import target.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A remote object has not yet reached the awaited condition.
    #[error("{0}")]
    NotReady(String),

    /// The wait deadline expired while the last attempt was still retryable.
    #[error("timeout while waiting: {cause}")]
    Timeout {
        /// Last retryable error observed.
        #[source]
        cause: Box<MetaKubeError>,
    },

    /// The operation context was cancelled between polls.
    #[error("context canceled: {cause}")]
    Cancelled {
        /// Last error observed before cancellation.
        #[source]
        cause: Box<MetaKubeError>,
    },

    /// A delete loop was interrupted by cancellation after the DELETE was accepted.
    #[error("Operation cancelled")]
    OperationCancelled,

    /// The requested change cannot be applied in place.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Provider configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Raised when no API token can be resolved.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthError {
    /// Description of the problem.
    pub message: String,
    /// Provider configuration attributes the problem is reported against.
    pub attributes: Vec<&'static str>,
}

/// Structured error payload returned by the MetaKube API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetails {
    /// HTTP-like error code reported by the server.
    #[serde(default)]
    pub code: i64,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Additional messages, e.g. per-field problems.
    #[serde(default)]
    pub additional: Vec<String>,
}

/// Envelope around [`ErrorDetails`] as sent on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: ErrorDetails,
}

/// A non-success response from the MetaKube API.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Name of the API operation, used as message prefix.
    pub operation: String,
    /// HTTP status code.
    pub status: u16,
    /// Structured payload, when the body carried one.
    pub payload: Option<ErrorDetails>,
    /// Raw response body.
    pub body: String,
}

/// Malformed import identifiers.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The identifier does not match the expected shape.
    #[error("unexpected import id \"{id}\", expected format: {expected}")]
    InvalidFormat {
        /// Identifier as supplied.
        id: String,
        /// Expected format description.
        expected: &'static str,
    },

    /// The identifier is well-formed but no owner could be found.
    #[error("could not find {what} \"{id}\" in any project")]
    OwnerNotFound {
        /// Kind of object that was looked up.
        what: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, MetaKubeError>;

impl ApiError {
    /// Builds an API error from a status and raw body, parsing the
    /// `{error:{code,message,additional}}` envelope when present.
    #[must_use]
    pub fn from_response(operation: impl Into<String>, status: u16, body: String) -> Self {
        let payload = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);
        Self {
            operation: operation.into(),
            status,
            payload,
            body,
        }
    }

    /// Returns the most specific message available.
    #[must_use]
    pub fn message(&self) -> String {
        if let Some(payload) = self.payload.as_ref().filter(|p| !p.message.is_empty()) {
            if payload.additional.is_empty() {
                return payload.message.clone();
            }
            return format!("{}: {}", payload.message, payload.additional.join("; "));
        }

        let body = self.body.trim();
        if body.is_empty() {
            reqwest::StatusCode::from_u16(self.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map_or_else(|| format!("status {}", self.status), str::to_string)
        } else {
            body.to_string()
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message())
    }
}

impl std::error::Error for ApiError {}

impl MetaKubeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a not-ready wait condition.
    #[must_use]
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady(message.into())
    }

    /// Returns the HTTP status code carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api(e) => Some(e.status),
            _ => None,
        }
    }

    /// Returns true for HTTP 401.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401))
    }

    /// Returns true for HTTP 403.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self.status(), Some(403))
    }

    /// Returns true for HTTP 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Returns true for HTTP 409.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(409))
    }

    /// Returns true for HTTP 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Returns true when the object should be considered deleted.
    ///
    /// Subordinate objects of a deleted cluster answer 403 instead of 404.
    #[must_use]
    pub const fn is_gone(&self) -> bool {
        self.is_not_found() || self.is_forbidden()
    }

    /// Returns true for server errors and transport failures.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.is_server_error() || matches!(self, Self::Transport { .. })
    }

    /// Returns true if the rendered message contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.to_string().contains(needle)
    }

    /// Converts the error into user-facing diagnostics.
    #[must_use]
    pub fn to_diagnostics(&self) -> Diagnostics {
        match self {
            Self::Validation(diagnostics) => diagnostics.clone(),
            Self::Auth(e) => e
                .attributes
                .iter()
                .map(|attribute| {
                    Diagnostic::error("Missing authentication token", e.message.clone())
                        .with_attribute(*attribute)
                })
                .collect(),
            Self::Config(ConfigError::ValidationError {
                message,
                field: Some(field),
            }) => Diagnostics::from(
                Diagnostic::error("Invalid provider configuration", message.clone())
                    .with_attribute(field.clone()),
            ),
            Self::Api(e) => Diagnostics::from(Diagnostic::error(e.operation.clone(), e.message())),
            other => Diagnostics::from(Diagnostic::error(other.summary(), other.to_string())),
        }
    }

    /// Short summary line used for diagnostics.
    fn summary(&self) -> &'static str {
        match self {
            Self::Config(_) => "Invalid provider configuration",
            Self::Auth(_) => "Missing authentication token",
            Self::Api(_) | Self::Transport { .. } | Self::InvalidResponse { .. } => {
                "MetaKube API request failed"
            }
            Self::Validation(_) => "Invalid configuration",
            Self::Import(_) => "Invalid import id",
            Self::NotReady(_) | Self::Timeout { .. } => "Timeout while waiting for resource",
            Self::Cancelled { .. } | Self::OperationCancelled => "Operation cancelled",
            Self::Unsupported(_) => "Unsupported operation",
            Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => "Internal error",
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl AuthError {
    /// Creates an error reported against both token attributes.
    #[must_use]
    pub fn missing_token(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attributes: vec!["token", "token_path"],
        }
    }
}
