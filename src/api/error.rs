use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;
use crate::stream::StreamError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("no backend match: {0}")]
    NoBackendMatch(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::NoBackendMatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::NoBackendMatch(_) => "NO_BACKEND_MATCH",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<StreamError> for ApiError {
    fn from(value: StreamError) -> Self {
        match value {
            StreamError::BadRequest => ApiError::BadRequest(value.to_string()),
            StreamError::Upstream { .. } => ApiError::Upstream(value.to_string()),
            StreamError::NoBackendMatch(e) => ApiError::NoBackendMatch(e.to_string()),
            StreamError::Signing(e) => ApiError::Internal(e.to_string()),
        }
    }
}
