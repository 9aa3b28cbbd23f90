use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use super::{
    error::ApiError,
    models::{HealthResponse, StreamQuery},
    state::AppState,
};

/// Playback entry point (GET /stream/{item_id}?MediaSourceId=...)
///
/// Answers `302 Found` with the signed backend URL in `Location`. A calendar
/// override may replace both ids, in which case the client's values are
/// ignored.
pub async fn stream(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let redirect = state
        .service
        .play_url(Some(&item_id), query.media_source_id.as_deref())
        .await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, redirect.location)]))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.service;

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backends: service.settings().router.len(),
        cached_urls: service.cached_urls(),
        metrics: service.metrics().snapshot(),
    };

    (StatusCode::OK, Json(response))
}
