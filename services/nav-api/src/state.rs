//! Shared application state for the HTTP surface.
//!
//! Binds one [`NavigationService`] singleton to the router; absence of
//! a loaded map degrades map-dependent routes to 503 rather than
//! preventing the process from starting (the tile cache and EKF need
//! no map to exist, only to be useful).

use std::sync::Arc;

use mag_calibration::CalibrationParams;
use mag_map::MagneticMap;
use nav_common::NavResult;
use nav_core::NavigationService;

use crate::config::AppConfig;

pub struct AppState {
    pub nav: Option<Arc<NavigationService>>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> NavResult<Self> {
        let nav = match &config.map_path {
            None => {
                tracing::warn!(
                    "QMAG_NAV_MAP_PATH not set; map-dependent routes will report 503"
                );
                None
            }
            Some(path) => {
                let map = match config.map_format {
                    Some(format) => {
                        MagneticMap::open_as(path, format, config.tile_cache_capacity, config.tile_size)?
                    }
                    None => MagneticMap::open(path)?,
                };
                tracing::info!(path = %path.display(), "loaded magnetic anomaly map");

                let service = NavigationService::new(
                    Arc::new(map),
                    config.filter,
                    CalibrationParams::identity(),
                    1,
                    0.0,
                    0.0,
                )?;
                Some(Arc::new(service))
            }
        };

        Ok(Self { nav, config })
    }
}
