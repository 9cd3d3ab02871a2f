//! Error handling for the axum server.
//! Maps `TrustError` to its own HTTP status and JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use trust_core::TrustError;

/// Wrapper to convert `TrustError` into an axum response.
pub struct AppError(TrustError);

impl From<TrustError> for AppError {
    fn from(e: TrustError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}
