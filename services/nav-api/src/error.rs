//! Maps [`NavError`] onto HTTP responses for this surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nav_common::NavError;
use serde_json::json;

pub struct ApiError(pub NavError);

impl From<NavError> for ApiError {
    fn from(err: NavError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({ "error": self.0.to_payload() }));
        (status, body).into_response()
    }
}
