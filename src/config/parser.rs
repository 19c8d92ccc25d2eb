//! Provider configuration loading.
//!
//! Configuration comes from a YAML file, then `METAKUBE_*` environment
//! variables override individual fields. A `.env` file next to the
//! configuration is loaded first when present.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, MetaKubeError, Result};

use super::provider::ProviderConfig;

/// Environment variables overriding provider configuration fields.
pub const ENV_HOST: &str = "METAKUBE_HOST";
/// Inline token override.
pub const ENV_TOKEN: &str = "METAKUBE_TOKEN";
/// Token file override.
pub const ENV_TOKEN_PATH: &str = "METAKUBE_TOKEN_PATH";
/// Debug flag override.
pub const ENV_DEBUG: &str = "METAKUBE_DEBUG";
/// Development flag override.
pub const ENV_DEVELOPMENT: &str = "METAKUBE_DEVELOPMENT";
/// Log file override.
pub const ENV_LOG_PATH: &str = "METAKUBE_LOG_PATH";

/// Loads [`ProviderConfig`] from files and the environment.
#[derive(Debug, Default)]
pub struct ConfigParser {
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory searched for `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let path = path.as_ref();
        info!("Loading provider configuration from: {}", path.display());

        if !path.exists() {
            return Err(MetaKubeError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            MetaKubeError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ProviderConfig> {
        debug!("Parsing YAML provider configuration");

        if content.trim().is_empty() {
            return Ok(ProviderConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            MetaKubeError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads `.env`, then the optional file, then environment overrides.
    ///
    /// Without a file the configuration comes from the environment alone.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env` or the file cannot be loaded.
    pub fn load(&self, path: Option<&Path>) -> Result<ProviderConfig> {
        self.load_dotenv()?;

        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => ProviderConfig::default(),
        };
        apply_env_overrides(&mut config, &crate::schema::process_env);
        Ok(config)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                MetaKubeError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        other => {
            warn!("Ignoring {name}={other:?}: expected true or false");
            None
        }
    }
}

/// Applies `METAKUBE_*` overrides found through `env`.
pub fn apply_env_overrides(config: &mut ProviderConfig, env: &dyn Fn(&str) -> Option<String>) {
    if let Some(host) = env(ENV_HOST) {
        debug!("Overriding host from environment");
        config.host = host;
    }

    if let Some(token) = env(ENV_TOKEN) {
        debug!("Overriding token from environment");
        config.token = Some(token);
    }

    if let Some(path) = env(ENV_TOKEN_PATH) {
        debug!("Overriding token_path from environment");
        config.token_path = Some(path);
    }

    if let Some(flag) = env(ENV_DEBUG).and_then(|v| parse_flag(ENV_DEBUG, &v)) {
        config.debug = flag;
    }

    if let Some(flag) = env(ENV_DEVELOPMENT).and_then(|v| parse_flag(ENV_DEVELOPMENT, &v)) {
        config.development = flag;
    }

    if let Some(path) = env(ENV_LOG_PATH).filter(|p| !p.trim().is_empty()) {
        debug!("Overriding log_path from environment");
        config.log_path = Some(PathBuf::from(path));
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["metakube.yaml", "metakube.yml"];

/// Finds the configuration file in `start_dir` or one of its parents.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}
