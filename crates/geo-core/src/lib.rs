//! Geodetic primitives shared across the qmag-nav workspace.
//!
//! Provides a validated [`LatLon`] type, WGS-84 [`Ecef`] conversion, and
//! haversine great-circle distance. All angles are in degrees unless
//! otherwise noted; all distances are in metres.

use nav_common::{NavError, NavResult};
use serde::{Deserialize, Serialize};

/// Semi-major axis of the WGS-84 ellipsoid, metres.
pub const WGS84_A: f64 = 6378137.0;
/// Flattening of the WGS-84 ellipsoid.
pub const WGS84_F: f64 = 1.0 / 298.257223563;
/// Mean Earth radius used for haversine distance, metres.
pub const EARTH_RADIUS_M: f64 = 6371008.8;

fn wgs84_b() -> f64 {
    WGS84_A * (1.0 - WGS84_F)
}

fn wgs84_e2() -> f64 {
    WGS84_F * (2.0 - WGS84_F)
}

/// A validated geographic coordinate.
///
/// Construction through [`LatLon::new`] guarantees `lat ∈ [-90, 90]`,
/// `lon ∈ [-180, 180]`, and both finite. There is no unvalidated
/// constructor — invalid coordinates are a construction-time error, not
/// a later one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    lat: f64,
    lon: f64,
}

impl LatLon {
    /// Validate and construct a coordinate.
    pub fn new(lat: f64, lon: f64) -> NavResult<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(NavError::Domain(format!(
                "non-finite coordinate: lat={lat}, lon={lon}"
            )));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(NavError::Domain(format!(
                "latitude out of range [-90, 90]: {lat}"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(NavError::Domain(format!(
                "longitude out of range [-180, 180]: {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Haversine great-circle distance to another coordinate, in metres.
    pub fn distance_m(&self, other: &LatLon) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Convert to Earth-Centered Earth-Fixed coordinates, assuming zero
    /// ellipsoidal height (this system carries no altitude state).
    pub fn to_ecef(&self) -> Ecef {
        let lat = self.lat.to_radians();
        let lon = self.lon.to_radians();
        let e2 = wgs84_e2();

        let n = WGS84_A / (1.0 - e2 * lat.sin().powi(2)).sqrt();

        Ecef {
            x: n * lat.cos() * lon.cos(),
            y: n * lat.cos() * lon.sin(),
            z: n * (1.0 - e2) * lat.sin(),
        }
    }
}

/// Earth-Centered Earth-Fixed coordinate, metres, on the WGS-84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ecef {
    /// Convert back to geodetic coordinates using Bowring's iterative
    /// method. Converges to 1e-12 rad or bails out after 5 iterations,
    /// whichever comes first — sufficient for the 1e-6 degree round-trip
    /// tolerance this system requires.
    pub fn to_lat_lon(&self) -> NavResult<LatLon> {
        let e2 = wgs84_e2();
        let b = wgs84_b();
        let p = (self.x * self.x + self.y * self.y).sqrt();
        let lon = self.y.atan2(self.x);

        if p < 1e-9 {
            // On the polar axis; longitude is undefined, latitude is +/-90.
            let lat = if self.z >= 0.0 { 90.0 } else { -90.0 };
            return LatLon::new(lat, lon.to_degrees());
        }

        let mut lat = self.z.atan2(p * (1.0 - e2));
        for _ in 0..5 {
            let sin_lat = lat.sin();
            let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
            let h = p / lat.cos() - n;
            let lat_next = self.z.atan2(p * (1.0 - e2 * n / (n + h)));
            if (lat_next - lat).abs() < 1e-12 {
                lat = lat_next;
                break;
            }
            lat = lat_next;
        }

        let _ = b; // retained for documentation of the ellipsoid in use
        LatLon::new(lat.to_degrees(), lon.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_non_finite() {
        assert!(LatLon::new(f64::NAN, 0.0).is_err());
        assert!(LatLon::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(LatLon::new(91.0, 0.0).is_err());
        assert!(LatLon::new(0.0, 181.0).is_err());
    }

    #[test]
    fn haversine_known_distance() {
        // London to Paris, approximately 344 km.
        let london = LatLon::new(51.5074, -0.1278).unwrap();
        let paris = LatLon::new(48.8566, 2.3522).unwrap();
        let d = london.distance_m(&paris);
        assert!((d - 343_500.0).abs() < 5000.0, "got {d}");
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = LatLon::new(10.0, 20.0).unwrap();
        assert_eq!(p.distance_m(&p), 0.0);
    }

    proptest! {
        #[test]
        fn ecef_round_trip(lat in -89.9f64..89.9, lon in -180.0f64..180.0) {
            let original = LatLon::new(lat, lon).unwrap();
            let ecef = original.to_ecef();
            let recovered = ecef.to_lat_lon().unwrap();

            prop_assert!((recovered.lat() - original.lat()).abs() < 1e-6);
            prop_assert!((recovered.lon() - original.lon()).abs() < 1e-6);
        }
    }
}
