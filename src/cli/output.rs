//! Output formatting for CLI commands.
//!
//! States are always printed redacted: sensitive attributes are replaced
//! before formatting.

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::api::types::Project;
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::error::Result;
use crate::resources::Response;
use crate::schema::Schema;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    format: OutputFormat,
}

/// Diagnostic row for table display.
#[derive(Tabled)]
struct DiagnosticRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Attribute")]
    attribute: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Project row for table display.
#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Serialize)]
struct ResponseJson<'a> {
    state: Option<Value>,
    diagnostics: &'a Diagnostics,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an operation response with its state redacted by `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be serialized.
    pub fn format_response<T: Serialize>(&self, schema: &Schema, response: &Response<T>) -> Result<String> {
        let state = response
            .state
            .as_ref()
            .map(|s| schema.redacted(s))
            .transpose()?;

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&ResponseJson {
                state,
                diagnostics: &response.diagnostics,
            })?),
            OutputFormat::Text => {
                let mut output = Self::format_diagnostics_text(&response.diagnostics);
                match state {
                    Some(state) => {
                        let yaml = serde_yaml::to_string(&state).map_err(|e| {
                            crate::error::MetaKubeError::internal(format!("failed to render state: {e}"))
                        })?;
                        let _ = write!(output, "\n{}\n{yaml}", schema.type_name.bold());
                    }
                    None => {
                        let _ = writeln!(output, "\n{} {} has no state", "-".dimmed(), schema.type_name);
                    }
                }
                Ok(output)
            }
        }
    }

    /// Formats diagnostics alone, e.g. for a failed operation.
    #[must_use]
    pub fn format_diagnostics(&self, diagnostics: &Diagnostics) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ResponseJson {
                state: None,
                diagnostics,
            })
            .unwrap_or_default(),
            OutputFormat::Text => Self::format_diagnostics_text(diagnostics),
        }
    }

    fn format_diagnostics_text(diagnostics: &Diagnostics) -> String {
        if diagnostics.is_empty() {
            return format!("{} No diagnostics.\n", "✓".green());
        }

        let rows: Vec<DiagnosticRow> = diagnostics.iter().map(Self::diagnostic_row).collect();
        let mut output = Table::new(rows).to_string();
        output.push('\n');

        let errors = diagnostics.errors().count();
        let warnings = diagnostics.len() - errors;
        let _ = writeln!(
            output,
            "\n{} errors, {} warnings",
            errors.to_string().red(),
            warnings.to_string().yellow()
        );
        output
    }

    fn diagnostic_row(diagnostic: &Diagnostic) -> DiagnosticRow {
        DiagnosticRow {
            severity: Self::format_severity(diagnostic.severity),
            attribute: diagnostic.attribute.clone().unwrap_or_default(),
            summary: diagnostic.summary.clone(),
            detail: Self::truncate(&diagnostic.detail, 80),
        }
    }

    /// Formats the projects visible to the token.
    #[must_use]
    pub fn format_projects(&self, projects: &[Project]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(projects).unwrap_or_default(),
            OutputFormat::Text => {
                if projects.is_empty() {
                    return String::from("   No projects visible to this token.\n");
                }

                let rows: Vec<ProjectRow> = projects
                    .iter()
                    .map(|p| ProjectRow {
                        id: p.id.clone(),
                        name: Self::truncate(&p.name, 40),
                        status: p.status.clone(),
                    })
                    .collect();

                let mut output = format!("{} Configuration is valid.\n\n", "✓".green());
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats a severity with color.
    fn format_severity(severity: Severity) -> String {
        match severity {
            Severity::Error => "error".red().to_string(),
            Severity::Warning => "warning".yellow().to_string(),
        }
    }

    /// Truncates a string to at most `max_len` characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::cluster::SCHEMA as CLUSTER_SCHEMA;
    use serde_json::json;

    #[test]
    fn test_json_response_is_redacted() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let state = json!({
            "name": "demo",
            "spec": {"cloud": {"openstack": {"application_credentials": {"id": "app", "secret": "s3cret"}}}}
        });
        let response = Response::new(state);

        let output = formatter
            .format_response(&CLUSTER_SCHEMA, &response)
            .expect("should format");
        assert!(!output.contains("s3cret"));
        assert!(output.contains("\"diagnostics\": []"));
    }

    #[test]
    fn test_text_lists_diagnostics() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let mut diagnostics = Diagnostics::new();
        diagnostics.error_at("spec.version", "Unknown version", "Available versions: 1.28.5");
        diagnostics.warn("Kubeconfig unavailable", "");

        let output = formatter.format_diagnostics(&diagnostics);
        assert!(output.contains("spec.version"));
        assert!(output.contains("Unknown version"));
        assert!(output.contains("1 errors, 1 warnings"));
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("äöüäöüäöüä-long", 8), "äöüäö...");
    }
}
