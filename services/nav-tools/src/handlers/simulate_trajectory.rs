//! `POST /tools/simulate_trajectory`

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use nav_common::NavError;
use serde::{Deserialize, Serialize};
use trajectory_sim::{simulate, PathType, SimulationParams, TrajectorySample};

use crate::error::ToolError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SimulateTrajectoryRequest {
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub speed: f64,
    pub sample_rate: f64,
    pub noise_level: f64,
    pub path_type: PathType,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SimulateTrajectoryResponse {
    pub samples: Vec<TrajectorySample>,
}

pub async fn simulate_trajectory(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<SimulateTrajectoryRequest>,
) -> Result<Json<SimulateTrajectoryResponse>, ToolError> {
    let Some(map) = &state.map else {
        return Err(ToolError(NavError::MapNotLoaded));
    };

    let params = SimulationParams {
        start: req.start,
        end: req.end,
        speed_mps: req.speed,
        sample_rate_hz: req.sample_rate,
        noise_std_nt: req.noise_level,
        path_type: req.path_type,
        seed: req.seed.unwrap_or(0),
    };

    let samples = simulate(map, params).await?;
    Ok(Json(SimulateTrajectoryResponse { samples }))
}
