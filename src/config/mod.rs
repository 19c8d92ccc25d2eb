//! Provider configuration.
//!
//! This module handles:
//! - Parsing the provider configuration from YAML
//! - Environment variable overrides (`METAKUBE_*`) and `.env` loading
//! - Validation of host and token settings

mod parser;
mod provider;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_DEBUG, ENV_DEVELOPMENT, ENV_HOST, ENV_LOG_PATH,
    ENV_TOKEN, ENV_TOKEN_PATH, apply_env_overrides, find_config_file,
};
pub use provider::ProviderConfig;
