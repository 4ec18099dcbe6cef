//! Shared raster grid types, used by every map-format loader and by the
//! map engine that sits on top of them. Keeping this in `nav-common`
//! (rather than duplicating it in each loader crate) mirrors how
//! `wms-common::GridSpec` is shared by every format-specific parser in
//! the wider weather-services codebase this workspace is modeled on.

use serde::{Deserialize, Serialize};

/// Describes a regular lat/lon grid. Cell `(i, j)` is centred at
/// `(lat0 + i*dlat, lon0 + j*dlon)`. `dlat`/`dlon` may be negative for
/// north-up rasters (the common case for satellite and reanalysis
/// products, which scan from the north pole southward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapHeader {
    pub nrows: usize,
    pub ncols: usize,
    pub lat0: f64,
    pub lon0: f64,
    pub dlat: f64,
    pub dlon: f64,
    pub nodata_sentinel: f32,
}

impl MapHeader {
    /// Coordinates of the centre of cell `(i, j)`.
    pub fn cell_center(&self, i: usize, j: usize) -> (f64, f64) {
        (
            self.lat0 + i as f64 * self.dlat,
            self.lon0 + j as f64 * self.dlon,
        )
    }

    /// Fractional grid indices `(row, col)` for a geographic point.
    pub fn frac_index(&self, lat: f64, lon: f64) -> (f64, f64) {
        ((lat - self.lat0) / self.dlat, (lon - self.lon0) / self.dlon)
    }

    pub fn len(&self) -> usize {
        self.nrows * self.ncols
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0 || self.ncols == 0
    }
}

/// A fully materialized raster: header plus row-major `f32` cell data.
/// Nodata cells are stored as `NaN`, already having been translated
/// from whatever sentinel the source format used.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub header: MapHeader,
    pub data: Vec<f32>,
}

impl RasterGrid {
    /// Random-access cell lookup. Panics on out-of-range indices —
    /// callers are expected to have already validated the stencil
    /// fits via `MapHeader`-derived bounds checks.
    pub fn cell(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.header.ncols + j]
    }
}

/// A sub-rectangle of a [`MapHeader`], the unit of tile-cache residency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileMetadata {
    pub row0: usize,
    pub col0: usize,
    pub nrows: usize,
    pub ncols: usize,
}

impl TileMetadata {
    /// True iff the bilinear interpolation stencil for `(i, j)` fits
    /// strictly inside this tile (i.e. `(i, j)` and `(i+1, j+1)` are
    /// both in range).
    pub fn contains(&self, i: usize, j: usize) -> bool {
        i >= self.row0
            && j >= self.col0
            && i + 1 < self.row0 + self.nrows
            && j + 1 < self.col0 + self.ncols
    }
}
