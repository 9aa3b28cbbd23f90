//! Logging setup and in-process counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Handle on the installed log filter.
///
/// Logging is installed before the configuration is read so load-time
/// warnings are not lost; the configured `log_level` is applied afterwards
/// unless `RUST_LOG` or the command line already chose a filter.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

/// Install the global subscriber. `RUST_LOG` wins over `level`, which wins
/// over the `info` bootstrap filter.
pub fn init_logging(level: Option<&str>) -> LogHandle {
    let pinned = std::env::var_os("RUST_LOG").is_some() || level.is_some();
    let (filter, handle) = reload::Layer::new(build_filter(level.unwrap_or("info")));

    // A second call (tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();

    LogHandle {
        filter: handle,
        pinned,
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_ascii_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

impl LogHandle {
    /// Whether `RUST_LOG` or an explicit level fixed the filter at startup
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Switch to the configured level unless the filter is pinned.
    pub fn apply_config_level(&self, level: &str) {
        if self.pinned {
            return;
        }
        if let Err(e) = self.filter.reload(build_filter(level)) {
            tracing::warn!(error = %e, level, "Failed to apply configured log level");
        }
    }
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    redirects_issued: AtomicU64,
    cache_hits: AtomicU64,
    stale_signatures: AtomicU64,
    upstream_failures: AtomicU64,
    fallbacks_used: AtomicU64,
    route_misses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect_issued(&self) {
        self.redirects_issued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "redirects_issued", "Metric incremented");
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cache_hits", "Metric incremented");
    }

    pub fn stale_signature(&self) {
        self.stale_signatures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "stale_signatures", "Metric incremented");
    }

    pub fn upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "upstream_failures", "Metric incremented");
    }

    pub fn fallback_used(&self) {
        self.fallbacks_used.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "fallbacks_used", "Metric incremented");
    }

    pub fn route_miss(&self) {
        self.route_misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "route_misses", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            redirects_issued: self.redirects_issued.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            stale_signatures: self.stale_signatures.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            fallbacks_used: self.fallbacks_used.load(Ordering::Relaxed),
            route_misses: self.route_misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub redirects_issued: u64,
    pub cache_hits: u64,
    pub stale_signatures: u64,
    pub upstream_failures: u64,
    pub fallbacks_used: u64,
    pub route_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_is_installed_before_config_is_read() {
        let handle = init_logging(Some("warn"));

        assert!(tracing::dispatcher::has_been_set());
        assert!(handle.is_pinned());
        // Pinned filters ignore the configured level.
        handle.apply_config_level("trace");
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // Parses either RUST_LOG or the fallback; never panics.
        let _ = build_filter("not a level ===");
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::new();
        metrics.redirect_issued();
        metrics.redirect_issued();
        metrics.cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.redirects_issued, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.route_misses, 0);
    }
}
