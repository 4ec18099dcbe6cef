//! Reads magnetic anomaly grids stored as NetCDF files with explicit
//! `lat`/`lon` coordinate variables (CF-conventions style), using the
//! native `netcdf` library rather than shelling out to `ncdump`.
//!
//! Unlike satellite-swath NetCDF products, a magnetic anomaly grid's
//! `lat`/`lon` coordinate vectors are expected to be monotonic and
//! uniformly spaced; [`load`] validates that and fails with
//! [`NavError::MapFormat`] if the spacing is irregular beyond a small
//! relative tolerance.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use nav_common::{MapHeader, NavError, NavResult, RasterGrid};

/// Relative tolerance for detecting non-uniform coordinate spacing.
const SPACING_TOLERANCE: f64 = 1e-9;

/// Name of the data variable holding the scalar field, e.g. total-field
/// magnetic anomaly in nanoteslas.
const DEFAULT_VARIABLE_NAME: &str = "anomaly";

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages even when the
/// calling code handles the failure gracefully (e.g. probing for an
/// attribute that doesn't exist). Call once per process before any
/// netcdf operation.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is documented safe to call with null handlers
        // to disable the library's default stderr error reporting.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Load a magnetic anomaly raster from a NetCDF file on disk.
pub fn load(path: impl AsRef<Path>) -> NavResult<RasterGrid> {
    load_variable(path, DEFAULT_VARIABLE_NAME)
}

/// Load a named scalar variable from a NetCDF file on disk.
pub fn load_variable(path: impl AsRef<Path>, variable: &str) -> NavResult<RasterGrid> {
    silence_hdf5_errors();
    let file = netcdf::open(path.as_ref())
        .map_err(|e| NavError::MapIo(format!("failed to open NetCDF file: {e}")))?;
    load_from_file(&file, variable)
}

/// Load a magnetic anomaly raster from an in-memory NetCDF byte buffer.
///
/// The `netcdf` crate wraps libnetcdf/HDF5, which require a real file
/// handle; the bytes are staged to a temp file first, preferring
/// `/dev/shm` on Linux to avoid disk I/O.
pub fn load_bytes(bytes: &[u8]) -> NavResult<RasterGrid> {
    load_bytes_variable(bytes, DEFAULT_VARIABLE_NAME)
}

pub fn load_bytes_variable(bytes: &[u8], variable: &str) -> NavResult<RasterGrid> {
    silence_hdf5_errors();

    let temp_dir = optimal_temp_dir();
    let temp_path = temp_dir.join(temp_filename());

    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(bytes)?;
    drop(file);

    let nc_file = netcdf::open(&temp_path)
        .map_err(|e| NavError::MapIo(format!("failed to open NetCDF buffer: {e}")));
    let result = nc_file.and_then(|f| load_from_file(&f, variable));

    let _ = std::fs::remove_file(&temp_path);
    result
}

fn load_from_file(file: &netcdf::File, variable: &str) -> NavResult<RasterGrid> {
    let lat_var = file
        .variable("lat")
        .ok_or_else(|| NavError::MapFormat("missing 'lat' coordinate variable".into()))?;
    let lon_var = file
        .variable("lon")
        .ok_or_else(|| NavError::MapFormat("missing 'lon' coordinate variable".into()))?;

    let lats: Vec<f64> = lat_var
        .get_values(..)
        .map_err(|e| NavError::MapFormat(format!("failed to read lat values: {e}")))?;
    let lons: Vec<f64> = lon_var
        .get_values(..)
        .map_err(|e| NavError::MapFormat(format!("failed to read lon values: {e}")))?;

    if lats.len() < 2 || lons.len() < 2 {
        return Err(NavError::MapFormat(
            "lat/lon coordinate vectors need at least 2 points each".into(),
        ));
    }

    let dlat = uniform_spacing(&lats, "lat")?;
    let dlon = uniform_spacing(&lons, "lon")?;

    let data_var = file
        .variable(variable)
        .ok_or_else(|| NavError::MapFormat(format!("missing data variable '{variable}'")))?;

    let nrows = lats.len();
    let ncols = lons.len();

    let raw: Vec<f64> = data_var
        .get_values(..)
        .map_err(|e| NavError::MapFormat(format!("failed to read '{variable}': {e}")))?;

    if raw.len() != nrows * ncols {
        return Err(NavError::MapFormat(format!(
            "data variable '{variable}' has {} values, expected {}x{}={}",
            raw.len(),
            nrows,
            ncols,
            nrows * ncols
        )));
    }

    let fill_value = get_f64_attr(&data_var, "_FillValue");
    let nodata_sentinel = fill_value.map(|v| v as f32).unwrap_or(f32::MIN);

    let data: Vec<f32> = raw
        .into_iter()
        .map(|v| match fill_value {
            Some(fill) if (v - fill).abs() < f64::EPSILON => f32::NAN,
            _ if v.is_nan() => f32::NAN,
            _ => v as f32,
        })
        .collect();

    let header = MapHeader {
        nrows,
        ncols,
        lat0: lats[0],
        lon0: lons[0],
        dlat,
        dlon,
        nodata_sentinel,
    };

    tracing::debug!(nrows, ncols, lat0 = lats[0], lon0 = lons[0], dlat, dlon, "loaded NetCDF raster");

    Ok(RasterGrid { header, data })
}

/// Validate that `coords` is monotonic with uniform spacing (within
/// [`SPACING_TOLERANCE`] relative to the first step), returning that step.
fn uniform_spacing(coords: &[f64], label: &str) -> NavResult<f64> {
    let step0 = coords[1] - coords[0];
    if step0 == 0.0 {
        return Err(NavError::MapFormat(format!(
            "{label} coordinate vector has a zero-size first step"
        )));
    }

    for w in coords.windows(2) {
        let step = w[1] - w[0];
        let rel_err = ((step - step0) / step0).abs();
        if rel_err > SPACING_TOLERANCE {
            return Err(NavError::MapFormat(format!(
                "{label} coordinate vector is not uniformly spaced: step {step} deviates from {step0}"
            )));
        }
    }

    Ok(step0)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !var.attributes().any(|a| a.name() == name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

fn optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm_path = Path::new("/dev/shm");
        if shm_path.exists() && shm_path.is_dir() {
            let probe = shm_path.join(format!(".netcdf_loader_test_{}", std::process::id()));
            if std::fs::write(&probe, b"test").is_ok() {
                let _ = std::fs::remove_file(&probe);
                return shm_path.to_path_buf();
            }
        }
    }
    std::env::temp_dir()
}

fn temp_filename() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let pid = std::process::id();
    let tid = std::thread::current().id();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("qmag_nav_{}_{:?}_{}.nc", pid, tid, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonuniform_spacing() {
        let coords = vec![0.0, 1.0, 2.0, 3.5];
        assert!(uniform_spacing(&coords, "lat").is_err());
    }

    #[test]
    fn accepts_uniform_spacing() {
        let coords = vec![0.0, 0.25, 0.5, 0.75, 1.0];
        assert_eq!(uniform_spacing(&coords, "lon").unwrap(), 0.25);
    }

    #[test]
    fn temp_filenames_are_unique() {
        assert_ne!(temp_filename(), temp_filename());
    }
}
