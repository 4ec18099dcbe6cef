//! `POST /tools/calibrate_sensor`

use axum::Json;
use mag_calibration::{CalibrationParams, MagneticVector};
use nav_common::NavError;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

#[derive(Debug, Deserialize)]
pub struct CalibrateSensorRequest {
    pub samples: Vec<[f64; 3]>,
    pub method: CalibrationMethod,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    Ellipsoid,
    Simple,
}

#[derive(Debug, Serialize)]
pub struct CalibrateSensorResponse {
    pub offset: [f64; 3],
    pub scale: [[f64; 3]; 3],
}

pub async fn calibrate_sensor(
    Json(req): Json<CalibrateSensorRequest>,
) -> Result<Json<CalibrateSensorResponse>, ToolError> {
    if req.samples.is_empty() {
        return Err(ToolError(NavError::Config(
            "calibrate_sensor requires at least one sample".into(),
        )));
    }

    let samples: Vec<MagneticVector> = req
        .samples
        .iter()
        .map(|s| MagneticVector::new(s[0], s[1], s[2]))
        .collect();

    let params = match req.method {
        CalibrationMethod::Simple => CalibrationParams::fit_simple(&samples)?,
        CalibrationMethod::Ellipsoid => CalibrationParams::fit_ellipsoid(&samples)?,
    };

    Ok(Json(CalibrateSensorResponse {
        offset: params.offset,
        scale: params.scale,
    }))
}
