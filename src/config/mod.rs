//! Configuration management for streamsign
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use streamsign::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `STREAMSIGN__<section>__<key>`
//!
//! Examples:
//! - `STREAMSIGN__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `STREAMSIGN__EMBY__URL=http://emby:8096`
//! - `STREAMSIGN__PLAY_URL_MAX_ALIVE_SECS=3600`
//!
//! Secrets are also read from `STREAMSIGN_ENCIPHER` and `EMBY_API_KEY`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/streamsign.toml`.
//! This can be overridden with `--config` or the `STREAMSIGN_CONFIG`
//! environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    BackendConfig, CalendarConfig, Config, EmbyConfig, ServerConfig, SpecialMediaConfig,
};
pub use sources::config_path;
pub use validation::ValidationError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`STREAMSIGN__*`, `STREAMSIGN_ENCIPHER`, `EMBY_API_KEY`)
    /// 2. TOML file (`path`, else `STREAMSIGN_CONFIG`, else `config/streamsign.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (bad backend urls, empty secret, etc.)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Signature lifetime as a duration
    pub fn play_url_max_alive(&self) -> chrono::Duration {
        i64::try_from(self.play_url_max_alive_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}
