//! Shared application state for the tool-call surface.

use std::sync::Arc;

use mag_calibration::CalibrationParams;
use mag_map::MagneticMap;
use nav_common::NavResult;
use nav_core::NavigationService;

use crate::config::AppConfig;

pub struct AppState {
    pub nav: Option<Arc<NavigationService>>,
    /// Kept independently of `nav` so `simulate_trajectory` and
    /// `query_magnetic_field` work even before any `estimate_position`
    /// call has constructed the filter side of the service.
    pub map: Option<Arc<MagneticMap>>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> NavResult<Self> {
        let map = match &config.map_path {
            None => {
                tracing::warn!(
                    "QMAG_NAV_MAP_PATH not set; map-dependent tools will report MapNotLoaded"
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
                Some(Arc::new(map))
            }
        };

        let nav = match &map {
            None => None,
            Some(map) => Some(Arc::new(NavigationService::new(
                map.clone(),
                config.filter,
                CalibrationParams::identity(),
                1,
                0.0,
                0.0,
            )?)),
        };

        Ok(Self { nav, map, config })
    }
}
