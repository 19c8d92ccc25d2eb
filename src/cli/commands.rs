//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// MetaKube provider - declarative clusters, node deployments and bindings.
#[derive(Parser, Debug)]
#[command(name = "metakube-provider")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the provider configuration file.
    #[arg(short, long, global = true, env = "METAKUBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Orchestrator version reported in the user agent.
    #[arg(long, global = true, default_value = env!("CARGO_PKG_VERSION"))]
    pub host_version: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the provider configuration and list visible projects.
    Check,

    /// Validate a model file without calling the API.
    Validate {
        /// Resource kind.
        kind: ResourceKind,

        /// Model file (YAML or JSON).
        file: PathBuf,
    },

    /// Create the object described by a model file.
    Create {
        /// Resource kind.
        kind: ResourceKind,

        /// Model file (YAML or JSON).
        file: PathBuf,
    },

    /// Refresh a state file from the API.
    Read {
        /// Resource kind.
        kind: ResourceKind,

        /// State file (YAML or JSON).
        state: PathBuf,
    },

    /// Move an object from a prior state to a new model.
    Update {
        /// Resource kind.
        kind: ResourceKind,

        /// Prior state file.
        state: PathBuf,

        /// New model file.
        file: PathBuf,
    },

    /// Delete the object recorded in a state file.
    Delete {
        /// Resource kind.
        kind: ResourceKind,

        /// State file (YAML or JSON).
        state: PathBuf,
    },

    /// Build state for an existing object from its import id.
    Import {
        /// Resource kind.
        kind: ResourceKind,

        /// Import id, e.g. `project:cluster`.
        id: String,
    },

    /// Look a project up by name.
    Project {
        /// Project name.
        name: String,
    },
}

/// Managed resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceKind {
    /// `metakube_cluster`.
    Cluster,
    /// `metakube_node_deployment`.
    NodeDeployment,
    /// `metakube_sshkey`.
    Sshkey,
    /// `metakube_role_binding`.
    RoleBinding,
    /// `metakube_cluster_role_binding`.
    ClusterRoleBinding,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
