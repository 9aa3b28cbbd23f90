use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use super::{PlaybackInfoSource, ResolveError, Result};

type Outcome = Option<Result<String>>;
type Inflight = DashMap<String, watch::Receiver<Outcome>>;

/// Resolves media paths, allowing at most one upstream call per key at a time.
///
/// The first caller for a key spawns the lookup on its own task and every
/// caller, the first included, waits on a watch channel for its outcome.
/// Dropping a waiting caller never cancels the lookup, so the remaining
/// waiters still receive the result.
#[derive(Clone)]
pub struct UpstreamResolver {
    source: Arc<dyn PlaybackInfoSource>,
    inflight: Arc<Inflight>,
}

impl UpstreamResolver {
    pub fn new(source: Arc<dyn PlaybackInfoSource>) -> Self {
        Self {
            source,
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Number of lookups currently in flight
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    pub async fn resolve(&self, item_id: &str, media_source_id: &str) -> Result<String> {
        let key = format!("mp:{item_id}:{media_source_id}");

        let (mut rx, leader) = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx.clone());
                (rx, Some(tx))
            }
        };

        match leader {
            Some(tx) => self.spawn_lookup(key, item_id, media_source_id, tx),
            None => debug!(item_id, media_source_id, "Joined in-flight upstream lookup"),
        }

        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(Err(ResolveError::Aborted)),
            Err(_) => Err(ResolveError::Aborted),
        }
    }

    fn spawn_lookup(
        &self,
        key: String,
        item_id: &str,
        media_source_id: &str,
        tx: watch::Sender<Outcome>,
    ) {
        let source = Arc::clone(&self.source);
        let guard = InflightGuard {
            inflight: Arc::clone(&self.inflight),
            key,
        };
        let item_id = item_id.to_string();
        let media_source_id = media_source_id.to_string();

        tokio::spawn(async move {
            let result = source
                .playback_info(&item_id, &media_source_id)
                .await
                .and_then(|info| {
                    info.path_for(&media_source_id)
                        .map(str::to_string)
                        .ok_or_else(|| ResolveError::SourceNotFound {
                            item_id: item_id.clone(),
                            media_source_id: media_source_id.clone(),
                        })
                });

            if let Ok(path) = &result {
                info!(item_id = %item_id, media_source_id = %media_source_id, media_path = %path, "Resolved media path");
            }

            // Unregister before publishing so late arrivals start a fresh lookup.
            drop(guard);
            tx.send_replace(Some(result));
        });
    }
}

/// Removes the in-flight registration even if the lookup task panics.
struct InflightGuard {
    inflight: Arc<Inflight>,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}
