//! MetaKube API transport.
//!
//! This module provides the typed HTTP client, token resolution and the wire
//! types of the MetaKube REST API.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::Authenticator;
pub use client::{DEFAULT_REQUEST_TIMEOUT_SECS, MetaKubeClient};
pub use types::*;
