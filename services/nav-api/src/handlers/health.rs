//! Liveness, readiness, and Prometheus metrics endpoints.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// GET /healthz — process liveness, independent of map load state.
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    ready: bool,
    map_loaded: bool,
}

/// GET /readyz — distinguishes liveness from the map-dependent
/// readiness the navigation pipeline's 503 semantics imply.
pub async fn readyz(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let map_loaded = state.nav.is_some();
    let status = if map_loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready: map_loaded,
            map_loaded,
        }),
    )
}

/// GET /metrics — Prometheus exposition format.
pub async fn metrics(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_reports_ok() {
        let Json(body) = healthz().await;
        assert_eq!(body.status, "ok");
    }
}
