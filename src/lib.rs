// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # MetaKube Provider
//!
//! Declarative resources for the MetaKube managed Kubernetes platform.
//!
//! ## Overview
//!
//! The provider mediates between a desired-state orchestrator and the
//! MetaKube HTTP API. It manages:
//!
//! - Clusters on AWS, OpenStack or Azure, with SSH key assignment
//! - Node deployments (worker pools), fixed-size or autoscaled
//! - Project SSH keys
//! - Namespaced role bindings and cluster role bindings
//!
//! and looks projects up by name.
//!
//! ## Architecture
//!
//! Each resource operation follows the same shape:
//!
//! 1. **Validate**: local checks, then read-only API checks (versions,
//!    datacenters, OpenStack networks)
//! 2. **Translate**: typed model to API request body
//! 3. **Mutate**: POST/PATCH/DELETE, retried on conflicts
//! 4. **Wait**: poll until the object is ready, bounded by a timeout and
//!    the orchestrator's cancellation signal
//! 5. **Read back**: API object to model, preserving values the API never
//!    returns
//!
//! ## Modules
//!
//! - [`api`]: HTTP client, token resolution and wire types
//! - [`schema`]: typed models and attribute tables
//! - [`translate`]: model to API body and back
//! - [`validate`]: pre-mutation validators
//! - [`resources`]: create/read/update/delete/import per resource type
//! - [`retry`]: bounded retry and polling
//! - [`config`]: provider configuration
//! - [`cli`]: command-line harness
//!
//! ## Example
//!
//! ```yaml
//! name: demo
//! project_id: proj-42
//! dc_name: dbl1
//! spec:
//!   version: 1.28.5
//!   cloud:
//!     openstack:
//!       floating_ip_pool: ext-net
//!       application_credentials:
//!         id: app-cred-id
//!         secret: app-cred-secret
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod translate;
pub mod validate;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::MetaKubeClient;
pub use config::{ConfigParser, ProviderConfig};
pub use context::OperationContext;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{MetaKubeError, Result};
pub use resources::{
    ClusterResource, ClusterRoleBindingResource, NodeDeploymentResource, ProjectDataSource,
    Resource, Response, RoleBindingResource, SshKeyResource,
};
