//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bfx_rest::RestError;
use serde_json::json;

/// Error rendered as a JSON body with a matching status code.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    NotConnected,
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::NotConnected => (
                StatusCode::CONFLICT,
                "Not connected to the exchange".to_string(),
            ),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RestError> for ApiError {
    fn from(e: RestError) -> Self {
        match e {
            RestError::InvalidSymbol(_) | RestError::InvalidTimeframe(_) => {
                Self::BadRequest(e.to_string())
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}
