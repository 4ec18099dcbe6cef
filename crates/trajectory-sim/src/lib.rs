//! Deterministic path + sensor-noise generator, used by the tool-call
//! `simulate_trajectory` operation and by integration tests that need
//! a reproducible observation stream.

use geo_core::LatLon;
use mag_map::{InterpolationMethod, MagneticMap};
use nav_common::{NavError, NavResult};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Shape of the path between `start` and `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    Straight,
    /// A sinusoidal lateral offset from the straight-line course.
    Curved,
    /// A Gaussian random walk biased toward `end`.
    Random,
}

/// One sampled point along a simulated trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub t: f64,
    pub lat: f64,
    pub lon: f64,
    pub b_true: f64,
    pub b_noisy: f64,
}

/// Parameters for one simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationParams {
    pub start: (f64, f64),
    pub end: (f64, f64),
    /// Ground speed, metres/second.
    pub speed_mps: f64,
    pub sample_rate_hz: f64,
    /// Standard deviation of additive Gaussian sensor noise, nanotesla.
    pub noise_std_nt: f64,
    pub path_type: PathType,
    pub seed: u64,
}

/// Generate a sampled trajectory from `start` to `end` over `map`.
///
/// Deterministic: the same `params` (including `seed`) always produces
/// an identical sequence of samples.
pub async fn simulate(
    map: &MagneticMap,
    params: SimulationParams,
) -> NavResult<Vec<TrajectorySample>> {
    if params.speed_mps <= 0.0 || !params.speed_mps.is_finite() {
        return Err(NavError::Domain(format!(
            "speed must be > 0, got {}",
            params.speed_mps
        )));
    }
    if params.sample_rate_hz <= 0.0 || !params.sample_rate_hz.is_finite() {
        return Err(NavError::Domain(format!(
            "sample rate must be > 0, got {}",
            params.sample_rate_hz
        )));
    }
    if params.noise_std_nt < 0.0 || !params.noise_std_nt.is_finite() {
        return Err(NavError::Domain(format!(
            "noise standard deviation must be >= 0, got {}",
            params.noise_std_nt
        )));
    }

    let start = LatLon::new(params.start.0, params.start.1)?;
    let end = LatLon::new(params.end.0, params.end.1)?;

    let total_distance_m = start.distance_m(&end);
    let duration_s = total_distance_m / params.speed_mps;
    let dt = 1.0 / params.sample_rate_hz;
    let steps = (duration_s * params.sample_rate_hz).round().max(1.0) as usize;

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let noise = Normal::new(0.0, params.noise_std_nt.max(1e-12))
        .map_err(|e| NavError::Config(format!("invalid noise distribution: {e}")))?;

    let mut samples = Vec::with_capacity(steps + 1);
    let mut rand_lat = params.start.0;
    let mut rand_lon = params.start.1;

    for step in 0..=steps {
        let frac = step as f64 / steps as f64;
        let t = step as f64 * dt;

        let (lat, lon) = match params.path_type {
            PathType::Straight => lerp(params.start, params.end, frac),
            PathType::Curved => {
                let (lat, lon) = lerp(params.start, params.end, frac);
                let lateral = (frac * std::f64::consts::PI * 2.0).sin() * 0.01;
                let (dlat, dlon) = perpendicular_offset(params.start, params.end, lateral);
                (lat + dlat, lon + dlon)
            }
            PathType::Random => {
                let (target_lat, target_lon) = lerp(params.start, params.end, frac);
                let pull = 0.3;
                rand_lat += (target_lat - rand_lat) * pull
                    + Normal::new(0.0, 0.002).unwrap().sample(&mut rng);
                rand_lon += (target_lon - rand_lon) * pull
                    + Normal::new(0.0, 0.002).unwrap().sample(&mut rng);
                (rand_lat, rand_lon)
            }
        };

        let b_true = map
            .interpolate(lat, lon, InterpolationMethod::Bilinear)
            .await
            .unwrap_or(f64::NAN);
        let b_noisy = if b_true.is_finite() {
            b_true + noise.sample(&mut rng)
        } else {
            f64::NAN
        };

        samples.push(TrajectorySample {
            t,
            lat,
            lon,
            b_true,
            b_noisy,
        });
    }

    Ok(samples)
}

fn lerp(start: (f64, f64), end: (f64, f64), frac: f64) -> (f64, f64) {
    (
        start.0 + (end.0 - start.0) * frac,
        start.1 + (end.1 - start.1) * frac,
    )
}

/// Offset perpendicular to the start->end course, scaled by `magnitude`
/// (degrees). Used to bow a "curved" path off the straight line.
fn perpendicular_offset(start: (f64, f64), end: (f64, f64), magnitude: f64) -> (f64, f64) {
    let dlat = end.0 - start.0;
    let dlon = end.1 - start.1;
    let len = (dlat * dlat + dlon * dlon).sqrt();
    if len < 1e-12 {
        return (0.0, 0.0);
    }
    // Rotate the course vector 90 degrees and scale.
    (-dlon / len * magnitude, dlat / len * magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_common::{MapHeader, RasterGrid};

    fn uniform_map(value: f32) -> MagneticMap {
        let nrows = 100;
        let ncols = 100;
        let data = vec![value; nrows * ncols];
        let grid = RasterGrid {
            header: MapHeader {
                nrows,
                ncols,
                lat0: -1.0,
                lon0: -1.0,
                dlat: 0.02,
                dlon: 0.02,
                nodata_sentinel: f32::MIN,
            },
            data,
        };
        MagneticMap::from_grid(grid, 8, 16).unwrap()
    }

    fn base_params(path_type: PathType) -> SimulationParams {
        SimulationParams {
            start: (0.0, 0.0),
            end: (0.5, 0.5),
            speed_mps: 50.0,
            sample_rate_hz: 1.0,
            noise_std_nt: 5.0,
            path_type,
            seed: 42,
        }
    }

    #[tokio::test]
    async fn same_seed_produces_identical_sequences() {
        let map = uniform_map(25000.0);
        let a = simulate(&map, base_params(PathType::Random)).await.unwrap();
        let b = simulate(&map, base_params(PathType::Random)).await.unwrap();

        assert_eq!(a.len(), b.len());
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.lat, sb.lat);
            assert_eq!(sa.lon, sb.lon);
            assert_eq!(sa.b_noisy, sb.b_noisy);
        }
    }

    #[tokio::test]
    async fn straight_path_starts_and_ends_correctly() {
        let map = uniform_map(1.0);
        let samples = simulate(&map, base_params(PathType::Straight)).await.unwrap();
        let first = samples.first().unwrap();
        let last = samples.last().unwrap();
        assert!((first.lat - 0.0).abs() < 1e-9);
        assert!((last.lat - 0.5).abs() < 1e-6);
        assert!((last.lon - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn rejects_non_positive_speed() {
        let map = uniform_map(1.0);
        let mut params = base_params(PathType::Straight);
        params.speed_mps = 0.0;
        assert!(simulate(&map, params).await.is_err());
    }

    #[tokio::test]
    async fn noise_free_samples_match_true_field_on_uniform_map() {
        let map = uniform_map(30000.0);
        let mut params = base_params(PathType::Straight);
        params.noise_std_nt = 0.0;
        let samples = simulate(&map, params).await.unwrap();
        for s in &samples {
            assert!((s.b_true - 30000.0).abs() < 1e-3);
        }
    }
}
