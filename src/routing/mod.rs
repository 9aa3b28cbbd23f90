//! Backend routing by storage path prefix
//!
//! A [`BackendRouter`] owns the configured backends sorted by prefix length
//! (longest first). Matching walks that list and returns the first backend
//! whose prefix is a literal prefix of the resolved media path, so a
//! `/mnt/anime/movie` backend wins over `/mnt/anime` for the same path.

use thiserror::Error;

use crate::config::BackendConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no backend configured for path: {0}")]
    NoBackendMatch(String),
}

/// A storage origin able to serve every file under `path_prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub name: String,
    pub base_url: String,
    pub path_prefix: String,
}

impl From<&BackendConfig> for Backend {
    fn from(value: &BackendConfig) -> Self {
        Self {
            name: value.name.clone(),
            base_url: value.url.clone(),
            path_prefix: value.path.clone(),
        }
    }
}

/// Result of a successful route lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub backend: &'a Backend,
    /// Media path with the backend prefix and one leading `/` removed
    pub remainder: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct BackendRouter {
    backends: Vec<Backend>,
}

impl BackendRouter {
    /// Build a router; backends are stably sorted by descending prefix length
    /// so equal-length prefixes keep their declared order.
    pub fn new(mut backends: Vec<Backend>) -> Self {
        backends.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        Self { backends }
    }

    pub fn from_config(backends: &[BackendConfig]) -> Self {
        Self::new(backends.iter().map(Backend::from).collect())
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn route<'a>(&'a self, media_path: &'a str) -> Result<RouteMatch<'a>, RouteError> {
        self.backends
            .iter()
            .find_map(|backend| {
                media_path
                    .strip_prefix(backend.path_prefix.as_str())
                    .map(|rest| RouteMatch {
                        backend,
                        remainder: rest.strip_prefix('/').unwrap_or(rest),
                    })
            })
            .ok_or_else(|| RouteError::NoBackendMatch(media_path.to_string()))
    }
}
