use super::models::{Config, DEFAULT_ENCIPHER};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::overrides::OverrideKey;

const MAX_UTC_OFFSET_MINUTES: u32 = 18 * 60;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("encipher secret must not be empty")]
    EmptyEncipher,

    #[error("play_url_max_alive_secs must be positive")]
    InvalidPlayUrlLifetime,

    #[error("Backend #{index} has an empty '{field}'")]
    EmptyBackendField { index: usize, field: &'static str },

    #[error("Backend '{name}' has an invalid url '{url}'")]
    InvalidBackendUrl { name: String, url: String },

    #[error("Backend name '{name}' is declared more than once")]
    DuplicateBackend { name: String },

    #[error("Invalid Emby url '{url}': {reason}")]
    InvalidEmbyUrl { url: String, reason: String },

    #[error("emby.timeout_secs must be positive")]
    InvalidEmbyTimeout,

    #[error("Morning window must satisfy start < end <= 24, got {start}..{end}")]
    InvalidMorningWindow { start: u32, end: u32 },

    #[error("utc_offset_minutes out of range: {0}")]
    InvalidUtcOffset(i32),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_signing(config)?;
    validate_backends(config)?;
    validate_emby(config)?;
    validate_calendar(config)?;
    warn_special_medias(config);
    Ok(())
}

fn validate_signing(config: &Config) -> Result<(), ValidationError> {
    if config.encipher.is_empty() {
        return Err(ValidationError::EmptyEncipher);
    }
    if config.encipher == DEFAULT_ENCIPHER {
        tracing::warn!("Using the built-in default encipher; set STREAMSIGN_ENCIPHER in production");
    }
    if config.play_url_max_alive_secs == 0 {
        return Err(ValidationError::InvalidPlayUrlLifetime);
    }
    Ok(())
}

/// Every backend needs all fields, an absolute URL and a unique name
fn validate_backends(config: &Config) -> Result<(), ValidationError> {
    let mut names = HashSet::new();

    for (index, backend) in config.backends.iter().enumerate() {
        for (field, value) in [
            ("name", &backend.name),
            ("url", &backend.url),
            ("path", &backend.path),
        ] {
            if value.is_empty() {
                return Err(ValidationError::EmptyBackendField { index, field });
            }
        }

        let parsed = Url::parse(&backend.url).ok();
        if parsed.is_none_or(|url| url.cannot_be_a_base()) {
            return Err(ValidationError::InvalidBackendUrl {
                name: backend.name.clone(),
                url: backend.url.clone(),
            });
        }

        if !names.insert(backend.name.as_str()) {
            return Err(ValidationError::DuplicateBackend {
                name: backend.name.clone(),
            });
        }
    }

    if config.backends.is_empty() {
        tracing::warn!("No backends configured; every stream request will fail");
    }

    Ok(())
}

fn validate_emby(config: &Config) -> Result<(), ValidationError> {
    if config.emby.timeout_secs == 0 {
        return Err(ValidationError::InvalidEmbyTimeout);
    }
    config
        .emby
        .full_url()
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidEmbyUrl {
            url: config.emby.url.clone(),
            reason: e.to_string(),
        })
}

fn validate_calendar(config: &Config) -> Result<(), ValidationError> {
    let calendar = &config.calendar;
    if calendar.morning_start_hour >= calendar.morning_end_hour || calendar.morning_end_hour > 24 {
        return Err(ValidationError::InvalidMorningWindow {
            start: calendar.morning_start_hour,
            end: calendar.morning_end_hour,
        });
    }
    if calendar.utc_offset_minutes.unsigned_abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(ValidationError::InvalidUtcOffset(calendar.utc_offset_minutes));
    }
    Ok(())
}

/// Incomplete special medias are tolerated but never selected
fn warn_special_medias(config: &Config) {
    for media in &config.special_medias {
        if media.key.parse::<OverrideKey>().is_err() {
            tracing::warn!(key = %media.key, name = %media.name, "Unknown special media key, rule ignored");
        } else if !media.is_complete() {
            tracing::warn!(key = %media.key, name = %media.name, "Incomplete special media, rule ignored");
        }
    }
}
