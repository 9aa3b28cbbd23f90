use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "STREAMSIGN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/streamsign.toml";
const ENV_PREFIX: &str = "STREAMSIGN";
const ENV_SEPARATOR: &str = "__";

const ENCIPHER_ENV_VAR: &str = "STREAMSIGN_ENCIPHER";
const EMBY_API_KEY_ENV_VAR: &str = "EMBY_API_KEY";

/// Resolve which configuration file to read:
/// explicit path, then `STREAMSIGN_CONFIG`, then the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path(explicit))?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets may come from plain environment variables so they stay out of files
fn load_secrets(config: &mut Config) {
    if let Ok(encipher) = env::var(ENCIPHER_ENV_VAR) {
        if !encipher.is_empty() {
            config.encipher = encipher;
        }
    }
    if let Ok(api_key) = env::var(EMBY_API_KEY_ENV_VAR) {
        if !api_key.is_empty() {
            config.emby.api_key = api_key;
        }
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // STREAMSIGN__EMBY__URL -> emby.url
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
