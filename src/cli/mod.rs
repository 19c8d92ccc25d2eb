//! CLI module for the MetaKube provider.
//!
//! This module provides a command-line harness that drives every resource
//! operation from model and state files.

mod commands;
mod documents;
mod output;

pub use commands::{Cli, Commands, OutputFormat, ResourceKind};
pub use documents::{load_plan, load_state, parse_document, read_document, to_value};
pub use output::OutputFormatter;
