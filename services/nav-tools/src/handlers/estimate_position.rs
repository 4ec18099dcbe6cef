//! `POST /tools/estimate_position`

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use nav_common::NavError;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EstimatePositionRequest {
    /// Already-calibrated scalar total-field reading, nanotesla.
    pub magnetic_field: f64,
    pub initial_latitude: Option<f64>,
    pub initial_longitude: Option<f64>,
    pub dt: Option<f64>,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Serialize)]
pub struct EstimatePositionResponse {
    pub lat: f64,
    pub lon: f64,
    pub vlat: f64,
    pub vlon: f64,
    pub quality: f64,
    pub covariance_diag: [f64; 4],
}

pub async fn estimate_position(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<EstimatePositionRequest>,
) -> Result<Json<EstimatePositionResponse>, ToolError> {
    let Some(nav) = &state.nav else {
        return Err(ToolError(NavError::MapNotLoaded));
    };

    if req.reset {
        let (lat, lon) = match (req.initial_latitude, req.initial_longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(ToolError(NavError::Domain(
                    "reset requires both initial_latitude and initial_longitude".into(),
                )))
            }
        };
        nav.reset(lat, lon).await?;
    }

    let dt = req.dt.unwrap_or(state.config.default_dt_s);
    let estimate = nav.observe_scalar(req.magnetic_field, dt).await?;

    Ok(Json(EstimatePositionResponse {
        lat: estimate.lat,
        lon: estimate.lon,
        vlat: estimate.vlat,
        vlon: estimate.vlon,
        quality: estimate.quality,
        covariance_diag: estimate.covariance_diag,
    }))
}
