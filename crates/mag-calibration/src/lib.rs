//! Sensor conditioning: hard/soft-iron calibration and a fixed-window
//! moving average, turning raw three-axis magnetometer samples into a
//! usable scalar observation.

use std::collections::VecDeque;

use nalgebra::{Matrix3, Vector3};
use nav_common::{NavError, NavResult};
use serde::{Deserialize, Serialize};

/// A raw or calibrated three-axis magnetic field sample, nanoteslas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagneticVector {
    pub bx: f64,
    pub by: f64,
    pub bz: f64,
}

impl MagneticVector {
    pub fn new(bx: f64, by: f64, bz: f64) -> Self {
        Self { bx, by, bz }
    }

    /// Scalar total field magnitude, nanoteslas.
    pub fn total(&self) -> f64 {
        (self.bx * self.bx + self.by * self.by + self.bz * self.bz).sqrt()
    }

    fn to_vector3(self) -> Vector3<f64> {
        Vector3::new(self.bx, self.by, self.bz)
    }

    fn from_vector3(v: Vector3<f64>) -> Self {
        Self {
            bx: v.x,
            by: v.y,
            bz: v.z,
        }
    }
}

impl std::ops::Add for MagneticVector {
    type Output = MagneticVector;
    fn add(self, rhs: MagneticVector) -> MagneticVector {
        MagneticVector::new(self.bx + rhs.bx, self.by + rhs.by, self.bz + rhs.bz)
    }
}

impl std::ops::Div<f64> for MagneticVector {
    type Output = MagneticVector;
    fn div(self, rhs: f64) -> MagneticVector {
        MagneticVector::new(self.bx / rhs, self.by / rhs, self.bz / rhs)
    }
}

/// Hard/soft-iron calibration: `apply(v) = scale * (v - offset)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub offset: [f64; 3],
    /// Row-major 3x3 scale (soft-iron correction) matrix.
    pub scale: [[f64; 3]; 3],
}

impl CalibrationParams {
    /// Identity calibration: no offset, unit scale.
    pub fn identity() -> Self {
        Self {
            offset: [0.0, 0.0, 0.0],
            scale: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    fn offset_vec(&self) -> Vector3<f64> {
        Vector3::from_row_slice(&self.offset)
    }

    fn scale_mat(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.scale[0][0],
            self.scale[0][1],
            self.scale[0][2],
            self.scale[1][0],
            self.scale[1][1],
            self.scale[1][2],
            self.scale[2][0],
            self.scale[2][1],
            self.scale[2][2],
        )
    }

    /// Apply hard/soft-iron correction to a raw sample.
    pub fn apply(&self, v: MagneticVector) -> MagneticVector {
        let corrected = self.scale_mat() * (v.to_vector3() - self.offset_vec());
        MagneticVector::from_vector3(corrected)
    }

    /// Invert a calibrated sample back to its raw form. Fails with
    /// `NavError::Config` if the scale matrix is singular.
    pub fn inverse(&self, v: MagneticVector) -> NavResult<MagneticVector> {
        let scale_inv = self
            .scale_mat()
            .try_inverse()
            .ok_or_else(|| NavError::Config("calibration scale matrix is singular".into()))?;
        let raw = scale_inv * v.to_vector3() + self.offset_vec();
        Ok(MagneticVector::from_vector3(raw))
    }

    /// Simple calibration: per-axis mean-centring, unit scale.
    pub fn fit_simple(samples: &[MagneticVector]) -> NavResult<Self> {
        if samples.is_empty() {
            return Err(NavError::Config(
                "cannot calibrate from zero samples".into(),
            ));
        }
        let n = samples.len() as f64;
        let mut sum = Vector3::zeros();
        for s in samples {
            sum += s.to_vector3();
        }
        let mean = sum / n;

        Ok(Self {
            offset: [mean.x, mean.y, mean.z],
            scale: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        })
    }

    /// Ellipsoid calibration: least-squares fit of an axis-aligned
    /// ellipsoid `(v - o)^2 / r_i^2 = 1` to the sample cloud, then
    /// derives a diagonal scale matrix that maps the fitted ellipsoid
    /// onto the unit sphere. This is the closed-form documented in the
    /// navigation pipeline spec: offset is the per-axis sample
    /// midrange, radii are the per-axis half-range, and scale is
    /// `diag(1/r_x, 1/r_y, 1/r_z)`.
    pub fn fit_ellipsoid(samples: &[MagneticVector]) -> NavResult<Self> {
        if samples.len() < 6 {
            return Err(NavError::Config(
                "ellipsoid calibration requires at least 6 samples".into(),
            ));
        }

        let (mut min, mut max) = (
            Vector3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            Vector3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        );
        for s in samples {
            let v = s.to_vector3();
            min = min.zip_map(&v, f64::min);
            max = max.zip_map(&v, f64::max);
        }

        let offset = (min + max) / 2.0;
        let radii = (max - min) / 2.0;

        for (axis, r) in ["x", "y", "z"].iter().zip(radii.iter()) {
            if *r <= 0.0 {
                return Err(NavError::Config(format!(
                    "degenerate sample cloud along {axis} axis: radius {r}"
                )));
            }
        }

        Ok(Self {
            offset: [offset.x, offset.y, offset.z],
            scale: [
                [1.0 / radii.x, 0.0, 0.0],
                [0.0, 1.0 / radii.y, 0.0],
                [0.0, 0.0, 1.0 / radii.z],
            ],
        })
    }
}

/// Conditions raw samples into a calibrated, smoothed scalar observation.
///
/// Holds a fixed-size ring of the last `W` calibrated samples; `push`
/// appends the newest sample and returns the component-wise mean over
/// whatever is currently in the ring (fewer than `W` samples are
/// averaged over what's present, not padded).
pub struct SensorConditioner {
    calibration: CalibrationParams,
    window: usize,
    ring: VecDeque<MagneticVector>,
}

impl SensorConditioner {
    /// Construct a conditioner with the given calibration and window
    /// size. `window` must be `> 0`.
    pub fn new(calibration: CalibrationParams, window: usize) -> NavResult<Self> {
        if window == 0 {
            return Err(NavError::Config(
                "moving-average window must be > 0".into(),
            ));
        }
        Ok(Self {
            calibration,
            window,
            ring: VecDeque::with_capacity(window),
        })
    }

    /// Apply calibration, append to the ring (evicting the oldest
    /// sample if full), and return the running mean.
    pub fn push(&mut self, raw: MagneticVector) -> MagneticVector {
        let calibrated = self.calibration.apply(raw);

        if self.ring.len() == self.window {
            self.ring.pop_front();
        }
        self.ring.push_back(calibrated);

        let mut sum = MagneticVector::new(0.0, 0.0, 0.0);
        for sample in &self.ring {
            sum = sum + *sample;
        }
        sum / self.ring.len() as f64
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identity_calibration_is_noop() {
        let cal = CalibrationParams::identity();
        let v = MagneticVector::new(1.0, 2.0, 3.0);
        assert_eq!(cal.apply(v), v);
    }

    #[test]
    fn zero_window_is_config_error() {
        assert!(SensorConditioner::new(CalibrationParams::identity(), 0).is_err());
    }

    #[test]
    fn conditioner_averages_over_available_samples() {
        let mut c = SensorConditioner::new(CalibrationParams::identity(), 4).unwrap();
        let m1 = c.push(MagneticVector::new(10.0, 0.0, 0.0));
        assert_eq!(m1, MagneticVector::new(10.0, 0.0, 0.0));

        let m2 = c.push(MagneticVector::new(20.0, 0.0, 0.0));
        assert_eq!(m2, MagneticVector::new(15.0, 0.0, 0.0));
    }

    #[test]
    fn conditioner_evicts_oldest_beyond_window() {
        let mut c = SensorConditioner::new(CalibrationParams::identity(), 2).unwrap();
        c.push(MagneticVector::new(0.0, 0.0, 0.0));
        c.push(MagneticVector::new(10.0, 0.0, 0.0));
        let m = c.push(MagneticVector::new(20.0, 0.0, 0.0));
        // window of 2: averages {10, 20}, not {0, 10, 20}
        assert_eq!(m, MagneticVector::new(15.0, 0.0, 0.0));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn simple_fit_centres_the_mean() {
        let samples = vec![
            MagneticVector::new(10.0, 0.0, 0.0),
            MagneticVector::new(-10.0, 0.0, 0.0),
            MagneticVector::new(0.0, 10.0, 0.0),
            MagneticVector::new(0.0, -10.0, 0.0),
        ];
        let cal = CalibrationParams::fit_simple(&samples).unwrap();
        assert!((cal.offset[0]).abs() < 1e-9);
        assert!((cal.offset[1]).abs() < 1e-9);
    }

    #[test]
    fn ellipsoid_fit_rejects_too_few_samples() {
        let samples = vec![MagneticVector::new(1.0, 0.0, 0.0); 3];
        assert!(CalibrationParams::fit_ellipsoid(&samples).is_err());
    }

    #[test]
    fn ellipsoid_fit_maps_cloud_onto_unit_sphere() {
        // A symmetric cloud along each axis with radius 50.
        let samples = vec![
            MagneticVector::new(50.0, 0.0, 0.0),
            MagneticVector::new(-50.0, 0.0, 0.0),
            MagneticVector::new(0.0, 50.0, 0.0),
            MagneticVector::new(0.0, -50.0, 0.0),
            MagneticVector::new(0.0, 0.0, 50.0),
            MagneticVector::new(0.0, 0.0, -50.0),
        ];
        let cal = CalibrationParams::fit_ellipsoid(&samples).unwrap();
        for s in &samples {
            let corrected = cal.apply(*s);
            assert!((corrected.total() - 1.0).abs() < 1e-9);
        }
    }

    proptest! {
        #[test]
        fn calibration_inverse_round_trips(
            bx in -1000.0f64..1000.0,
            by in -1000.0f64..1000.0,
            bz in -1000.0f64..1000.0,
            ox in -50.0f64..50.0,
            oy in -50.0f64..50.0,
            oz in -50.0f64..50.0,
            sx in 0.5f64..2.0,
            sy in 0.5f64..2.0,
            sz in 0.5f64..2.0,
        ) {
            let cal = CalibrationParams {
                offset: [ox, oy, oz],
                scale: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, sz]],
            };
            let v = MagneticVector::new(bx, by, bz);
            let applied = cal.apply(v);
            let recovered = cal.inverse(applied).unwrap();

            prop_assert!((recovered.bx - v.bx).abs() < 1e-6 * v.bx.abs().max(1.0));
            prop_assert!((recovered.by - v.by).abs() < 1e-6 * v.by.abs().max(1.0));
            prop_assert!((recovered.bz - v.bz).abs() < 1e-6 * v.bz.abs().max(1.0));
        }
    }
}
