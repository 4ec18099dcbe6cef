//! Maps [`NavError`] onto the tool surface's structured error payload.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nav_common::NavError;
use serde_json::json;

pub struct ToolError(pub NavError);

impl From<NavError> for ToolError {
    fn from(err: NavError) -> Self {
        ToolError(err)
    }
}

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({ "error": self.0.to_payload() }));
        (status, body).into_response()
    }
}
