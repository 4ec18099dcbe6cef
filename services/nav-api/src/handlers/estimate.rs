//! `POST /estimate` — the thin public HTTP endpoint.
//!
//! Per the navigation pipeline's own open question, this accepts a
//! `{lat, lon}` body: a *position*-domain pseudo-observation, not a
//! magnetic one. It is implemented, deliberately, by sampling the
//! loaded map's anomaly value at the claimed position and feeding
//! that value through the same predict+update pipeline a real
//! magnetic reading would use — it is not silently reinterpreted as
//! a magnetic observation, and the tool surface's `estimate_position`
//! operation (which does take a magnetic scalar) is the other,
//! explicit shape.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Extension;
use axum::Json;
use mag_map::InterpolationMethod;
use nav_common::NavError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub lat: f64,
    pub lon: f64,
    pub quality: f64,
}

pub async fn estimate(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let started = Instant::now();
    metrics::counter!("nav_api_estimate_requests_total").increment(1);

    let Some(nav) = &state.nav else {
        return Err(ApiError(NavError::MapNotLoaded));
    };

    geo_core::LatLon::new(req.lat, req.lon)?;

    let claimed_field = nav
        .query_field(req.lat, req.lon, InterpolationMethod::Bilinear)
        .await?;

    let estimate = nav
        .observe_scalar(claimed_field, state.config.estimate_dt_s)
        .await?;

    metrics::histogram!("nav_api_estimate_duration_seconds").record(started.elapsed().as_secs_f64());

    Ok(Json(EstimateResponse {
        lat: estimate.lat,
        lon: estimate.lon,
        quality: estimate.quality,
    }))
}
