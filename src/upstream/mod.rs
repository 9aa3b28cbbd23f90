//! Upstream media-metadata lookups
//!
//! The media server is reached through [`PlaybackInfoSource`]; the
//! production implementation is [`EmbyClient`]. [`UpstreamResolver`] sits in
//! front of it, selects the requested media source and coalesces concurrent
//! lookups for the same item.

mod emby;
mod resolver;

pub use emby::{EmbyClient, HttpConfig};
pub use resolver::UpstreamResolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures are `Clone` so one coalesced outcome can be handed to every waiter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("upstream response could not be decoded: {0}")]
    Decode(String),

    #[error("media source '{media_source_id}' not found for item '{item_id}'")]
    SourceNotFound {
        item_id: String,
        media_source_id: String,
    },

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("upstream lookup was aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Subset of the media server's `PlaybackInfo` response used for routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackInfo {
    #[serde(rename = "MediaSources", default)]
    pub media_sources: Vec<MediaSourceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSourceInfo {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Path", default)]
    pub path: String,
}

impl PlaybackInfo {
    /// Storage path of the source whose id equals `media_source_id`
    pub fn path_for(&self, media_source_id: &str) -> Option<&str> {
        self.media_sources
            .iter()
            .find(|source| source.id == media_source_id && !source.path.is_empty())
            .map(|source| source.path.as_str())
    }
}

/// Remote lookup of the playable sources of an item
#[async_trait]
pub trait PlaybackInfoSource: Send + Sync {
    async fn playback_info(&self, item_id: &str, media_source_id: &str) -> Result<PlaybackInfo>;
}
