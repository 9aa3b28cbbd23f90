//! Playback request orchestration
//!
//! [`StreamService`] turns one playback request into a signed redirect:
//!
//! 1. A calendar override, when active, replaces the requested item and
//!    skips the upstream lookup.
//! 2. A cached URL is reused only if its signature still verifies and has
//!    not expired; otherwise it is ignored (not deleted).
//! 3. The media path comes from the upstream resolver, falling back to the
//!    missing-media override when the lookup fails.
//! 4. The path is routed to a backend, signed and written through the cache.

mod url;

pub use url::{build_play_url, signature_param};

use bon::bon;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::{UrlCache, cache_key};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::observability::Metrics;
use crate::overrides::OverridePolicy;
use crate::routing::{BackendRouter, RouteError};
use crate::signer::{SignedPayload, Signer, SignerError};
use crate::upstream::{PlaybackInfoSource, ResolveError, UpstreamResolver};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Missing itemID or MediaSourceId")]
    BadRequest,

    #[error("failed to resolve media path for item '{item_id}' source '{media_source_id}': {source}")]
    Upstream {
        item_id: String,
        media_source_id: String,
        source: ResolveError,
    },

    #[error(transparent)]
    NoBackendMatch(#[from] RouteError),

    #[error("failed to sign play url: {0}")]
    Signing(#[from] SignerError),
}

/// Everything that is replaced as one unit on configuration reload.
#[derive(Debug)]
pub struct GatewaySettings {
    pub router: BackendRouter,
    pub signer: Signer,
    pub play_url_max_alive: chrono::Duration,
    pub overrides: OverridePolicy,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Result<Self, SignerError> {
        Ok(Self {
            router: BackendRouter::from_config(&config.backends),
            signer: Signer::new(&config.encipher)?,
            play_url_max_alive: config.play_url_max_alive(),
            overrides: OverridePolicy::from_config(&config.special_medias, &config.calendar),
        })
    }
}

/// Outcome of a successful request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub from_cache: bool,
}

/// The item a request ends up signing, after overrides are applied.
struct Target {
    item_id: String,
    media_source_id: String,
    /// Set for overrides, which bypass the upstream lookup
    media_path: Option<String>,
}

pub struct StreamService {
    settings: RwLock<Arc<GatewaySettings>>,
    cache: Arc<dyn UrlCache>,
    resolver: UpstreamResolver,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

#[bon]
impl StreamService {
    #[builder]
    pub fn new(
        settings: GatewaySettings,
        cache: Arc<dyn UrlCache>,
        source: Arc<dyn PlaybackInfoSource>,
        #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)] clock: Arc<dyn Clock>,
        #[builder(default)] metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
            cache,
            resolver: UpstreamResolver::new(source),
            clock,
            metrics,
        }
    }
}

impl StreamService {
    /// Current settings snapshot; callers keep using it even if a reload lands.
    pub fn settings(&self) -> Arc<GatewaySettings> {
        let guard = self.settings.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap routing, signing and overrides in one step.
    pub fn reload(&self, settings: GatewaySettings) {
        let mut guard = self.settings.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(settings);
        info!(backends = guard.router.len(), "Gateway settings reloaded");
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn cached_urls(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a playback request into a signed redirect.
    pub async fn play_url(
        &self,
        item_id: Option<&str>,
        media_source_id: Option<&str>,
    ) -> Result<Redirect, StreamError> {
        let now = self.clock.now();
        let settings = self.settings();
        let target = resolve_target(&settings.overrides, now, item_id, media_source_id)?;
        let key = cache_key(&target.item_id, &target.media_source_id);

        if let Some(location) = self.cached_url(&settings, &key, now.timestamp()).await {
            self.metrics.cache_hit();
            debug!(cache_key = %key, "Valid cached play url");
            return Ok(Redirect {
                location,
                from_cache: true,
            });
        }

        let media_path = match target.media_path {
            Some(path) => path,
            None => {
                self.resolve_media_path(&settings, &target.item_id, &target.media_source_id)
                    .await?
            }
        };

        let location = issue_play_url(
            &settings,
            &target.item_id,
            &target.media_source_id,
            &media_path,
            now,
        )
        .inspect_err(|e| {
            if matches!(e, StreamError::NoBackendMatch(_)) {
                self.metrics.route_miss();
            }
        })?;

        if let Err(e) = self.cache.set(&key, location.clone()).await {
            warn!(cache_key = %key, error = %e, "Failed to cache play url");
        }

        self.metrics.redirect_issued();
        info!(
            item_id = %target.item_id,
            media_source_id = %target.media_source_id,
            media_path = %media_path,
            "Issued play url"
        );

        Ok(Redirect {
            location,
            from_cache: false,
        })
    }

    /// A cached URL counts only while its signature decrypts and is unexpired.
    async fn cached_url(&self, settings: &GatewaySettings, key: &str, unix_now: i64) -> Option<String> {
        let url = self.cache.get(key).await?;

        let valid = signature_param(&url)
            .and_then(|token| settings.signer.decrypt(&token).ok())
            .is_some_and(|payload: SignedPayload| payload.is_valid_at(unix_now));

        if !valid {
            self.metrics.stale_signature();
            debug!(cache_key = %key, "Cached play url has an invalid or expired signature");
            return None;
        }
        Some(url)
    }

    async fn resolve_media_path(
        &self,
        settings: &GatewaySettings,
        item_id: &str,
        media_source_id: &str,
    ) -> Result<String, StreamError> {
        let err = match self.resolver.resolve(item_id, media_source_id).await {
            Ok(path) => return Ok(path),
            Err(err) => err,
        };

        self.metrics.upstream_failure();
        error!(item_id, media_source_id, error = %err, "Failed to fetch media path");

        match settings.overrides.missing_media_fallback() {
            Some(rule) => {
                self.metrics.fallback_used();
                warn!(
                    item_id,
                    media_source_id,
                    fallback = %rule.name,
                    media_path = %rule.media_path,
                    "Using missing-media fallback"
                );
                Ok(rule.media_path.clone())
            }
            None => Err(StreamError::Upstream {
                item_id: item_id.to_string(),
                media_source_id: media_source_id.to_string(),
                source: err,
            }),
        }
    }
}

fn resolve_target(
    overrides: &OverridePolicy,
    now: DateTime<Utc>,
    item_id: Option<&str>,
    media_source_id: Option<&str>,
) -> Result<Target, StreamError> {
    if let Some(rule) = overrides.pre_check(now) {
        info!(rule = %rule.name, key = %rule.key, "Special date detected");
        return Ok(Target {
            item_id: rule.item_id.clone(),
            media_source_id: rule.media_source_id.clone(),
            media_path: Some(rule.media_path.clone()),
        });
    }

    match (
        item_id.filter(|id| !id.is_empty()),
        media_source_id.filter(|id| !id.is_empty()),
    ) {
        (Some(item_id), Some(media_source_id)) => Ok(Target {
            item_id: item_id.to_string(),
            media_source_id: media_source_id.to_string(),
            media_path: None,
        }),
        _ => {
            warn!(?item_id, ?media_source_id, "Missing itemID or MediaSourceId");
            Err(StreamError::BadRequest)
        }
    }
}

fn issue_play_url(
    settings: &GatewaySettings,
    item_id: &str,
    media_source_id: &str,
    media_path: &str,
    now: DateTime<Utc>,
) -> Result<String, StreamError> {
    let matched = settings.router.route(media_path).inspect_err(|_| {
        error!(item_id, media_source_id, media_path, "No matching backend configured for media path");
    })?;
    info!(backend = %matched.backend.name, media_path, "Matched backend");

    let expire_at = now
        .checked_add_signed(settings.play_url_max_alive)
        .map_or(i64::MAX, |at| at.timestamp());
    let token = settings.signer.encrypt(item_id, media_source_id, expire_at)?;

    Ok(build_play_url(&matched.backend.base_url, matched.remainder, &token))
}
