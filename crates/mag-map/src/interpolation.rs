//! Grid interpolation: bilinear (required) and bicubic/Catmull-Rom
//! (falls back to bilinear when its wider stencil does not fit).

use nav_common::{MapHeader, NavError, NavResult};

use crate::source::RasterSource;

/// Interpolation method requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMethod {
    Bilinear,
    Bicubic,
}

/// Interpolate `source` at `(lat, lon)` using `method`.
///
/// Fails with `NavError::OutOfMap` when the bilinear stencil itself
/// does not fit inside the grid. Bicubic falls back to bilinear,
/// silently, whenever its 4x4 stencil would run off the edge of the
/// grid; this only happens within one cell of the border, where the
/// two methods already nearly agree.
pub fn interpolate(
    source: &dyn RasterSource,
    lat: f64,
    lon: f64,
    method: InterpolationMethod,
) -> NavResult<f64> {
    let header = source.header();
    let (row, col) = header.frac_index(lat, lon);

    match method {
        InterpolationMethod::Bilinear => bilinear(source, header, row, col),
        InterpolationMethod::Bicubic => {
            if bicubic_stencil_fits(header, row, col) {
                Ok(bicubic(source, header, row, col))
            } else {
                bilinear(source, header, row, col)
            }
        }
    }
}

fn bilinear(source: &dyn RasterSource, header: &MapHeader, row: f64, col: f64) -> NavResult<f64> {
    if row < 0.0 || col < 0.0 {
        return Err(NavError::OutOfMap {
            lat: header.lat0 + row * header.dlat,
            lon: header.lon0 + col * header.dlon,
        });
    }

    let i0 = row.floor() as usize;
    let j0 = col.floor() as usize;

    if i0 + 1 >= header.nrows || j0 + 1 >= header.ncols {
        return Err(NavError::OutOfMap {
            lat: header.lat0 + row * header.dlat,
            lon: header.lon0 + col * header.dlon,
        });
    }

    let rf = row - i0 as f64;
    let cf = col - j0 as f64;

    let v00 = source.cell(i0, j0) as f64;
    let v01 = source.cell(i0, j0 + 1) as f64;
    let v10 = source.cell(i0 + 1, j0) as f64;
    let v11 = source.cell(i0 + 1, j0 + 1) as f64;

    if v00.is_nan() || v01.is_nan() || v10.is_nan() || v11.is_nan() {
        return Ok(f64::NAN);
    }

    let top = v00 * (1.0 - cf) + v01 * cf;
    let bottom = v10 * (1.0 - cf) + v11 * cf;
    Ok(top * (1.0 - rf) + bottom * rf)
}

fn bicubic_stencil_fits(header: &MapHeader, row: f64, col: f64) -> bool {
    if row < 0.0 || col < 0.0 {
        return false;
    }
    let i0 = row.floor() as i64;
    let j0 = col.floor() as i64;
    i0 - 1 >= 0
        && j0 - 1 >= 0
        && (i0 + 2) < header.nrows as i64
        && (j0 + 2) < header.ncols as i64
}

fn bicubic(source: &dyn RasterSource, header: &MapHeader, row: f64, col: f64) -> f64 {
    let i0 = row.floor() as i64;
    let j0 = col.floor() as i64;
    let rf = row - i0 as f64;
    let cf = col - j0 as f64;

    let mut samples = [[0.0f64; 4]; 4];
    for (di, row_slot) in samples.iter_mut().enumerate() {
        for (dj, slot) in row_slot.iter_mut().enumerate() {
            let i = (i0 - 1 + di as i64) as usize;
            let j = (j0 - 1 + dj as i64) as usize;
            let v = source.cell(i, j) as f64;
            if v.is_nan() {
                return f64::NAN;
            }
            *slot = v;
        }
    }

    let mut rows = [0.0f64; 4];
    for (r, sample_row) in samples.iter().enumerate() {
        rows[r] = cubic_1d(sample_row[0], sample_row[1], sample_row[2], sample_row[3], cf);
    }
    cubic_1d(rows[0], rows[1], rows[2], rows[3], rf)
}

/// Catmull-Rom spline through four evenly-spaced samples, parameter
/// `t` in `[0, 1]` measuring position between `p1` and `p2`.
fn cubic_1d(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_common::RasterGrid;

    fn grid(nrows: usize, ncols: usize, data: Vec<f32>) -> RasterGrid {
        RasterGrid {
            header: MapHeader {
                nrows,
                ncols,
                lat0: 0.0,
                lon0: 0.0,
                dlat: 1.0,
                dlon: 1.0,
                nodata_sentinel: f32::MIN,
            },
            data,
        }
    }

    #[test]
    fn bilinear_matches_corners_exactly() {
        let g = grid(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let v = interpolate(&g, 0.0, 0.0, InterpolationMethod::Bilinear).unwrap();
        assert_eq!(v, 1.0);
        let v = interpolate(&g, 1.0, 1.0, InterpolationMethod::Bilinear).unwrap();
        assert_eq!(v, 4.0);
    }

    #[test]
    fn bilinear_midpoint_is_average() {
        let g = grid(2, 2, vec![0.0, 0.0, 0.0, 4.0]);
        let v = interpolate(&g, 0.5, 0.5, InterpolationMethod::Bilinear).unwrap();
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_map_fails_cleanly() {
        let g = grid(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let err = interpolate(&g, 5.0, 5.0, InterpolationMethod::Bilinear).unwrap_err();
        assert!(matches!(err, NavError::OutOfMap { .. }));
    }

    #[test]
    fn nan_stencil_cell_propagates() {
        let g = grid(2, 2, vec![1.0, f32::NAN, 3.0, 4.0]);
        let v = interpolate(&g, 0.5, 0.5, InterpolationMethod::Bilinear).unwrap();
        assert!(v.is_nan());
    }

    #[test]
    fn bicubic_falls_back_to_bilinear_near_border() {
        let g = grid(3, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        // (0.5, 0.5) is one cell from every edge: the 4x4 bicubic stencil
        // cannot fit inside a 3x3 grid, so this must equal the bilinear result.
        let bicubic = interpolate(&g, 0.5, 0.5, InterpolationMethod::Bicubic).unwrap();
        let bilinear = interpolate(&g, 0.5, 0.5, InterpolationMethod::Bilinear).unwrap();
        assert_eq!(bicubic, bilinear);
    }

    #[test]
    fn bicubic_matches_bilinear_at_grid_nodes() {
        let g = test_support::indexed_grid(6, 6, 0.0, 0.0, 1.0, 1.0);
        let v = interpolate(&g, 2.0, 2.0, InterpolationMethod::Bicubic).unwrap();
        assert!((v - 14.0).abs() < 1e-9);
    }
}
