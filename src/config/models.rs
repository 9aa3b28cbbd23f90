use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Secret the play-URL signer derives its keys from
    #[serde(default = "default_encipher")]
    pub encipher: String,
    /// Lifetime of an issued signature in seconds
    #[serde(default = "default_play_url_max_alive_secs")]
    pub play_url_max_alive_secs: u64,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub emby: EmbyConfig,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub special_medias: Vec<SpecialMediaConfig>,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            encipher: default_encipher(),
            play_url_max_alive_secs: default_play_url_max_alive_secs(),
            server: ServerConfig::default(),
            emby: EmbyConfig::default(),
            backends: Vec::new(),
            special_medias: Vec::new(),
            calendar: CalendarConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) const DEFAULT_ENCIPHER: &str = "vPQC5LWCN2CW2opz";

fn default_encipher() -> String {
    DEFAULT_ENCIPHER.to_string()
}

fn default_play_url_max_alive_secs() -> u64 {
    6 * 60 * 60
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Interval of the background cache sweep, 0 disables it
    #[serde(default = "default_cache_sweep_secs")]
    pub cache_sweep_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cache_sweep_secs: default_cache_sweep_secs(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 60001))
}

fn default_cache_sweep_secs() -> u64 {
    5 * 60
}

/// Upstream media server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbyConfig {
    #[serde(default = "default_emby_url")]
    pub url: String,
    /// Merged into `url` unless the url already names a port; 0 leaves it alone
    #[serde(default = "default_emby_port")]
    pub port: u16,
    /// Loaded from `EMBY_API_KEY` when set
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_emby_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbyConfig {
    fn default() -> Self {
        Self {
            url: default_emby_url(),
            port: default_emby_port(),
            api_key: String::new(),
            timeout_secs: default_emby_timeout_secs(),
        }
    }
}

impl EmbyConfig {
    /// Base URL with the configured port applied
    ///
    /// A port written in `url` always wins, including the scheme's default
    /// port, which `Url` would otherwise normalise away.
    pub fn full_url(&self) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.url)?;
        if has_explicit_port(&self.url) {
            return Ok(self.url.trim().trim_end_matches('/').to_string());
        }
        if self.port != 0 {
            // Only fails for cannot-be-a-base URLs, which keep their form.
            let _ = url.set_port(Some(self.port));
        }
        Ok(url.as_str().trim_end_matches('/').to_string())
    }
}

/// Whether the authority of `raw` spells out a port, e.g. `host:80` or `[::1]:443`.
fn has_explicit_port(raw: &str) -> bool {
    let Some((_, rest)) = raw.trim().split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    match host_port.strip_prefix('[') {
        Some(ipv6) => ipv6
            .split_once(']')
            .is_some_and(|(_, tail)| tail.starts_with(':')),
        None => host_port.contains(':'),
    }
}

fn default_emby_url() -> String {
    "http://127.0.0.1".to_string()
}

fn default_emby_port() -> u16 {
    8096
}

fn default_emby_timeout_secs() -> u64 {
    10
}

/// A streaming backend serving everything under `path`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    pub name: String,
    pub url: String,
    pub path: String,
}

/// Substitute target for special dates or missing media
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpecialMediaConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub media_path: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub media_source_id: String,
}

impl SpecialMediaConfig {
    pub fn is_complete(&self) -> bool {
        !self.key.is_empty()
            && !self.name.is_empty()
            && !self.media_path.is_empty()
            && !self.item_id.is_empty()
            && !self.media_source_id.is_empty()
    }
}

/// Time windows for calendar-keyed special medias
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// Offset of the wall clock the windows are expressed in
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// First hour (inclusive) of the fixed-date morning window
    #[serde(default = "default_morning_start_hour")]
    pub morning_start_hour: u32,
    /// Last hour (exclusive) of the fixed-date morning window
    #[serde(default = "default_morning_end_hour")]
    pub morning_end_hour: u32,
    /// Gregorian dates of Lunar New Year's Eve
    #[serde(default = "default_lunar_new_year_eves")]
    pub lunar_new_year_eves: Vec<NaiveDate>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            morning_start_hour: default_morning_start_hour(),
            morning_end_hour: default_morning_end_hour(),
            lunar_new_year_eves: default_lunar_new_year_eves(),
        }
    }
}

fn default_utc_offset_minutes() -> i32 {
    8 * 60
}

fn default_morning_start_hour() -> u32 {
    0
}

fn default_morning_end_hour() -> u32 {
    12
}

fn default_lunar_new_year_eves() -> Vec<NaiveDate> {
    [
        (2025, 1, 28),
        (2026, 2, 16),
        (2027, 2, 5),
        (2028, 1, 25),
        (2029, 2, 12),
        (2030, 2, 2),
    ]
    .into_iter()
    .filter_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    .collect()
}
