//! Configuration management.
//!
//! Settings are layered, lowest precedence first:
//! - built-in defaults
//! - an optional TOML file (`--config`)
//! - environment variables (`XTTS_DEMO__SECTION__KEY`)
//! - command-line flags

mod settings;

pub use settings::{
    BackendSettings, DEFAULT_MODEL, ENV_PREFIX, LoggingSettings, PathSettings, ServerSettings,
    Settings, WaveformSettings, load_settings,
};

use thiserror::Error;

/// Errors that can occur while loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
