//! Request and response shapes of the HTTP surface.
//!
//! - `GET /stream/{item_id}?MediaSourceId=...` answers `302 Found` with a
//!   signed `Location`, or an [`ErrorResponse`] body.
//! - `GET /health` returns a [`HealthResponse`].

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct StreamQuery {
    #[serde(rename = "MediaSourceId", default)]
    pub media_source_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backends: usize,
    pub cached_urls: usize,
    pub metrics: MetricsSnapshot,
}
