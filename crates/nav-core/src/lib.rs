//! Thread-safe singleton binding sensor conditioning, the EKF, and the
//! magnetic map behind three calls: `observe`, `query_field`, `reset`.
//!
//! The filter mutex is held only across `predict`+`update`; `query_field`
//! never takes it, matching the concurrency discipline the navigation
//! pipeline requires (map reads proceed independently of filter writes).

use std::sync::Arc;

use mag_calibration::{CalibrationParams, MagneticVector, SensorConditioner};
use mag_map::{InterpolationMethod, MagneticMap};
use nav_common::NavResult;
use nav_ekf::{FilterConfig, NavEkf};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Result of one `observe` cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Estimate {
    pub lat: f64,
    pub lon: f64,
    pub vlat: f64,
    pub vlon: f64,
    pub quality: f64,
    pub covariance_diag: [f64; 4],
}

/// The navigation pipeline's singleton: one EKF, one map, one conditioner.
pub struct NavigationService {
    ekf: Arc<Mutex<NavEkf>>,
    map: Arc<MagneticMap>,
    conditioner: Arc<Mutex<SensorConditioner>>,
}

impl NavigationService {
    pub fn new(
        map: Arc<MagneticMap>,
        filter_config: FilterConfig,
        calibration: CalibrationParams,
        conditioner_window: usize,
        initial_lat: f64,
        initial_lon: f64,
    ) -> NavResult<Self> {
        let ekf = NavEkf::new(initial_lat, initial_lon, filter_config)?;
        let conditioner = SensorConditioner::new(calibration, conditioner_window)?;
        Ok(Self {
            ekf: Arc::new(Mutex::new(ekf)),
            map,
            conditioner: Arc::new(Mutex::new(conditioner)),
        })
    }

    pub fn map(&self) -> &Arc<MagneticMap> {
        &self.map
    }

    /// Condition a raw sample, predict the filter forward by `dt`,
    /// then fuse the conditioned scalar observation.
    pub async fn observe(&self, raw: MagneticVector, dt: f64) -> NavResult<Estimate> {
        let conditioned = {
            let mut conditioner = self.conditioner.lock().await;
            conditioner.push(raw)
        };
        let z_obs = conditioned.total();

        let mut ekf = self.ekf.lock().await;
        ekf.predict(dt)?;
        let quality = ekf.update(z_obs, &self.map).await?;

        Ok(Estimate {
            lat: ekf.lat(),
            lon: ekf.lon(),
            vlat: ekf.vlat(),
            vlon: ekf.vlon(),
            quality,
            covariance_diag: ekf.covariance_diag(),
        })
    }

    /// Fuse an already-scalar total-field observation directly,
    /// bypassing sensor conditioning.
    ///
    /// Used by callers that already hold a calibrated nanotesla
    /// reading rather than a raw three-axis sample — the HTTP
    /// surface's `/estimate` endpoint derives one via a map lookup at
    /// a claimed position, and the tool surface's `estimate_position`
    /// operation accepts one directly from its caller.
    pub async fn observe_scalar(&self, z_obs: f64, dt: f64) -> NavResult<Estimate> {
        let mut ekf = self.ekf.lock().await;
        ekf.predict(dt)?;
        let quality = ekf.update(z_obs, &self.map).await?;

        Ok(Estimate {
            lat: ekf.lat(),
            lon: ekf.lon(),
            vlat: ekf.vlat(),
            vlon: ekf.vlon(),
            quality,
            covariance_diag: ekf.covariance_diag(),
        })
    }

    /// Query the map directly, bypassing the filter entirely. Never
    /// takes the filter lock, so it proceeds concurrently with any
    /// number of in-flight `observe`/`reset` calls.
    pub async fn query_field(
        &self,
        lat: f64,
        lon: f64,
        method: InterpolationMethod,
    ) -> NavResult<f64> {
        self.map.interpolate(lat, lon, method).await
    }

    /// Re-initialize the filter at `(lat, lon)` with zero velocity.
    pub async fn reset(&self, lat: f64, lon: f64) -> NavResult<()> {
        let mut ekf = self.ekf.lock().await;
        ekf.reset(lat, lon)
    }

    /// Snapshot the current filter state without mutating it.
    pub async fn current_estimate(&self) -> Estimate {
        let ekf = self.ekf.lock().await;
        Estimate {
            lat: ekf.lat(),
            lon: ekf.lon(),
            vlat: ekf.vlat(),
            vlon: ekf.vlon(),
            quality: ekf.quality(),
            covariance_diag: ekf.covariance_diag(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_common::{MapHeader, RasterGrid};

    fn gradient_map() -> Arc<MagneticMap> {
        let nrows = 200;
        let ncols = 200;
        let mut data = vec![0.0f32; nrows * ncols];
        for i in 0..nrows {
            for j in 0..ncols {
                data[i * ncols + j] = (i + j) as f32;
            }
        }
        let grid = RasterGrid {
            header: MapHeader {
                nrows,
                ncols,
                lat0: -10.0,
                lon0: -10.0,
                dlat: 0.1,
                dlon: 0.1,
                nodata_sentinel: f32::MIN,
            },
            data,
        };
        Arc::new(MagneticMap::from_grid(grid, 16, 32).unwrap())
    }

    #[tokio::test]
    async fn observe_advances_state_and_reports_quality() {
        let map = gradient_map();
        let service = NavigationService::new(
            map,
            FilterConfig::default(),
            CalibrationParams::identity(),
            4,
            0.0,
            0.0,
        )
        .unwrap();

        let raw = MagneticVector::new(100.0, 0.0, 0.0);
        let estimate = service.observe(raw, 1.0).await.unwrap();
        assert!(estimate.quality >= 0.0 && estimate.quality <= 1.0);
    }

    #[tokio::test]
    async fn observe_scalar_bypasses_the_conditioner() {
        let map = gradient_map();
        let service = NavigationService::new(
            map.clone(),
            FilterConfig::default(),
            CalibrationParams::identity(),
            4,
            0.0,
            0.0,
        )
        .unwrap();

        let true_value = service.query_field(0.05, 0.05, InterpolationMethod::Bilinear).await.unwrap();
        let estimate = service.observe_scalar(true_value, 1.0).await.unwrap();
        assert!(estimate.quality >= 0.0 && estimate.quality <= 1.0);
    }

    #[tokio::test]
    async fn query_field_does_not_require_observe_first() {
        let map = gradient_map();
        let service = NavigationService::new(
            map,
            FilterConfig::default(),
            CalibrationParams::identity(),
            4,
            0.0,
            0.0,
        )
        .unwrap();

        let value = service
            .query_field(0.0, 0.0, InterpolationMethod::Bilinear)
            .await
            .unwrap();
        assert!(value.is_finite());
    }

    #[tokio::test]
    async fn reset_updates_state_immediately() {
        let map = gradient_map();
        let service = NavigationService::new(
            map,
            FilterConfig::default(),
            CalibrationParams::identity(),
            4,
            0.0,
            0.0,
        )
        .unwrap();

        service.reset(5.0, 5.0).await.unwrap();
        let estimate = service.current_estimate().await;
        assert_eq!(estimate.lat, 5.0);
        assert_eq!(estimate.lon, 5.0);
    }
}
