//! Logging setup.
//!
//! Human-readable events go to stderr. When a log file is configured, the
//! same events are appended to it as JSON lines. `RUST_LOG` overrides the
//! level chosen from the provider flags.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::ProviderConfig;
use crate::error::{MetaKubeError, Result};

/// Returns the default filter directive for `config`.
#[must_use]
pub const fn default_level(config: &ProviderConfig) -> &'static str {
    if config.verbose() { "debug" } else { "info" }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init_logging(config: &ProviderConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(config)));

    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file = match &config.log_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().json().with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|e| MetaKubeError::internal(format!("failed to install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_follows_flags() {
        let mut config = ProviderConfig::default();
        assert_eq!(default_level(&config), "info");

        config.debug = true;
        assert_eq!(default_level(&config), "debug");

        config.debug = false;
        config.development = true;
        assert_eq!(default_level(&config), "debug");
    }
}
