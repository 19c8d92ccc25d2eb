//! Per-operation timeouts block.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// User-supplied `timeouts { create, update, delete }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Create timeout, e.g. `20m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    /// Update timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    /// Delete timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

/// Default timeouts of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutDefaults {
    /// Create.
    pub create: Duration,
    /// Update.
    pub update: Duration,
    /// Delete.
    pub delete: Duration,
}

impl TimeoutDefaults {
    /// Cluster defaults: 20m / 20m / 40m.
    pub const CLUSTER: Self = Self {
        create: Duration::from_secs(20 * 60),
        update: Duration::from_secs(20 * 60),
        delete: Duration::from_secs(40 * 60),
    };

    /// Node deployment defaults: 20m / 20m / 20m.
    pub const NODE_DEPLOYMENT: Self = Self {
        create: Duration::from_secs(20 * 60),
        update: Duration::from_secs(20 * 60),
        delete: Duration::from_secs(20 * 60),
    };
}

impl Timeouts {
    /// Resolves the create timeout.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the duration does not parse.
    pub fn create_or(timeouts: Option<&Self>, defaults: TimeoutDefaults) -> Result<Duration> {
        resolve(timeouts.and_then(|t| t.create.as_deref()), defaults.create, "timeouts.create")
    }

    /// Resolves the update timeout.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the duration does not parse.
    pub fn update_or(timeouts: Option<&Self>, defaults: TimeoutDefaults) -> Result<Duration> {
        resolve(timeouts.and_then(|t| t.update.as_deref()), defaults.update, "timeouts.update")
    }

    /// Resolves the delete timeout.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the duration does not parse.
    pub fn delete_or(timeouts: Option<&Self>, defaults: TimeoutDefaults) -> Result<Duration> {
        resolve(timeouts.and_then(|t| t.delete.as_deref()), defaults.delete, "timeouts.delete")
    }
}

fn resolve(raw: Option<&str>, default: Duration, field: &str) -> Result<Duration> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => parse_duration(raw).map_err(|e| ConfigError::validation(e, field).into()),
    }
}

/// Parses durations such as `45s`, `20m`, `1h30m` or `500ms`.
///
/// # Errors
///
/// Returns a description of the problem when the text is not a sequence of
/// `<number><unit>` pairs with unit `h`, `m`, `s` or `ms`.
pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let invalid = || format!("invalid duration {text:?}, expected e.g. \"45s\", \"20m\" or \"1h30m\"");

    if text.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "h" => Duration::from_secs(amount.saturating_mul(3600)),
            "m" => Duration::from_secs(amount.saturating_mul(60)),
            "s" => Duration::from_secs(amount),
            "ms" => Duration::from_millis(amount),
            _ => return Err(invalid()),
        };
        total = total.saturating_add(part);
    }

    Ok(total)
}
