//! Raster source abstraction shared by every map format loader.

use nav_common::{MapHeader, NavError, NavResult, RasterGrid};
use std::path::Path;

/// A fully materialized, randomly-addressable raster grid.
///
/// `geotiff-loader` and `netcdf-loader` each produce a [`RasterGrid`];
/// this trait lets the rest of `mag-map` stay agnostic of which one
/// backed a given [`crate::MagneticMap`].
pub trait RasterSource: Send + Sync {
    fn header(&self) -> &MapHeader;
    fn cell(&self, i: usize, j: usize) -> f32;
}

impl RasterSource for RasterGrid {
    fn header(&self) -> &MapHeader {
        &self.header
    }

    fn cell(&self, i: usize, j: usize) -> f32 {
        RasterGrid::cell(self, i, j)
    }
}

/// Raster format accepted by [`load_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    GeoTiff,
    NetCdf,
}

impl MapFormat {
    /// Infer a format from a file extension. Unrecognized extensions
    /// fail with `NavError::Config` rather than silently guessing.
    pub fn from_extension(path: impl AsRef<Path>) -> NavResult<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("tif") | Some("tiff") => Ok(MapFormat::GeoTiff),
            Some("nc") | Some("nc4") | Some("netcdf") => Ok(MapFormat::NetCdf),
            other => Err(NavError::Config(format!(
                "cannot infer map format from extension {other:?}; set QMAG_NAV_MAP_FORMAT explicitly"
            ))),
        }
    }
}

/// Load a [`RasterGrid`] of the given format from a filesystem path.
pub fn load_source(path: impl AsRef<Path>, format: MapFormat) -> NavResult<RasterGrid> {
    match format {
        MapFormat::GeoTiff => geotiff_loader::load(path),
        MapFormat::NetCdf => netcdf_loader::load(path),
    }
}
