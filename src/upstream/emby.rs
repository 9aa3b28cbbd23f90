//! HTTP client for the Emby `PlaybackInfo` endpoint

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{PlaybackInfo, PlaybackInfoSource, ResolveError, Result};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 100,
            user_agent: concat!("streamsign/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Pooled client shared by every request; cloning shares the pool.
#[derive(Debug, Clone)]
pub struct EmbyClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl EmbyClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, config: HttpConfig) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ResolveError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ResolveError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ResolveError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// `{base}/Items/{item_id}/PlaybackInfo?MediaSourceId=..&api_key=..`
    pub fn playback_info_url(&self, item_id: &str, media_source_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ResolveError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["Items", item_id, "PlaybackInfo"]);
        url.query_pairs_mut()
            .append_pair("MediaSourceId", media_source_id)
            .append_pair("api_key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl PlaybackInfoSource for EmbyClient {
    async fn playback_info(&self, item_id: &str, media_source_id: &str) -> Result<PlaybackInfo> {
        let url = self.playback_info_url(item_id, media_source_id)?;
        debug!(item_id, media_source_id, path = url.path(), "Fetching playback info");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(item_id, media_source_id, error = %e, "Playback info request failed");
            if e.is_timeout() {
                ResolveError::Timeout
            } else {
                ResolveError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(item_id, media_source_id, status = status.as_u16(), "Upstream returned non-success status");
            return Err(ResolveError::Status(status.as_u16()));
        }

        response.json::<PlaybackInfo>().await.map_err(|e| {
            error!(item_id, media_source_id, error = %e, "Failed to decode playback info");
            ResolveError::Decode(e.to_string())
        })
    }
}
