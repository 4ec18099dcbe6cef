//! `POST /tools/query_magnetic_field`

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use mag_map::InterpolationMethod;
use nav_common::NavError;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryMagneticFieldRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub interpolation_method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryMagneticFieldResponse {
    pub value: f64,
    pub unit: &'static str,
    pub method: &'static str,
}

fn parse_method(raw: Option<&str>) -> Result<InterpolationMethod, ToolError> {
    match raw {
        None | Some("bilinear") => Ok(InterpolationMethod::Bilinear),
        Some("bicubic") => Ok(InterpolationMethod::Bicubic),
        Some(other) => Err(ToolError(NavError::Config(format!(
            "unknown interpolation_method {other:?}; expected 'bilinear' or 'bicubic'"
        )))),
    }
}

pub async fn query_magnetic_field(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<QueryMagneticFieldRequest>,
) -> Result<Json<QueryMagneticFieldResponse>, ToolError> {
    let method = parse_method(req.interpolation_method.as_deref())?;

    let Some(map) = &state.map else {
        return Err(ToolError(NavError::MapNotLoaded));
    };

    geo_core::LatLon::new(req.latitude, req.longitude).map_err(ToolError)?;

    let value = map.interpolate(req.latitude, req.longitude, method).await?;

    Ok(Json(QueryMagneticFieldResponse {
        value,
        unit: "nT",
        method: match method {
            InterpolationMethod::Bilinear => "bilinear",
            InterpolationMethod::Bicubic => "bicubic",
        },
    }))
}
