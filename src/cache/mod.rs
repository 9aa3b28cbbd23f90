//! Time-bounded cache of issued play URLs
//!
//! Entries live for a fixed TTL measured from insertion. Expiry is lazy: a
//! stale entry reads as a miss and stays in the map until it is overwritten
//! or swept by [`MemoryCache::spawn_sweeper`]. Signature validity is not
//! checked here; callers re-validate hits against the signer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Lifetime of a cached URL, independent of its signature lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Build the cache key for a playback request.
pub fn cache_key(item_id: &str, media_source_id: &str) -> String {
    format!("{item_id}:{media_source_id}")
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub signed_url: String,
    pub inserted_at: DateTime<Utc>,
}

/// Storage for issued play URLs
#[async_trait]
pub trait UrlCache: Send + Sync {
    /// Return the URL stored under `key` unless it is absent or past its TTL
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, signed_url: String) -> Result<()>;

    /// Number of stored entries, including ones not yet swept
    fn len(&self) -> usize;
}

pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at > self.ttl
    }

    /// Drop every entry older than the TTL, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(self.entries.len())
    }

    /// Periodically purge expired entries until the returned task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.entries.len(), "Swept expired play URLs");
                }
            }
        })
    }
}

#[async_trait]
impl UrlCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if self.is_expired(&entry, self.clock.now()) {
            return None;
        }
        Some(entry.signed_url.clone())
    }

    async fn set(&self, key: &str, signed_url: String) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                signed_url,
                inserted_at: self.clock.now(),
            },
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
