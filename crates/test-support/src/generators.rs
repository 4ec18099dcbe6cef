//! Synthetic magnetic anomaly grid generators producing predictable,
//! verifiable test data patterns.

use nav_common::{MapHeader, RasterGrid};

fn header(nrows: usize, ncols: usize, lat0: f64, lon0: f64, dlat: f64, dlon: f64) -> MapHeader {
    MapHeader {
        nrows,
        ncols,
        lat0,
        lon0,
        dlat,
        dlon,
        nodata_sentinel: f32::MIN,
    }
}

/// A flat grid where every cell equals `value`. Useful when a test
/// only cares that interpolation is a no-op (zero gradient).
pub fn flat_grid(
    nrows: usize,
    ncols: usize,
    value: f32,
    lat0: f64,
    lon0: f64,
    dlat: f64,
    dlon: f64,
) -> RasterGrid {
    RasterGrid {
        header: header(nrows, ncols, lat0, lon0, dlat, dlon),
        data: vec![value; nrows * ncols],
    }
}

/// A grid whose cell `(row, col)` equals `row * ncols + col`, i.e. its
/// row-major linear index. Exercises row/col addressing directly: a
/// mis-ordered stencil lookup reads a neighbouring cell's value instead.
pub fn indexed_grid(
    nrows: usize,
    ncols: usize,
    lat0: f64,
    lon0: f64,
    dlat: f64,
    dlon: f64,
) -> RasterGrid {
    let mut data = Vec::with_capacity(nrows * ncols);
    for row in 0..nrows {
        for col in 0..ncols {
            data.push((row * ncols + col) as f32);
        }
    }
    RasterGrid {
        header: header(nrows, ncols, lat0, lon0, dlat, dlon),
        data,
    }
}

/// A grid with a smooth linear gradient `value = row + col`, useful
/// for exercising the EKF's measurement Jacobian (non-zero, constant
/// partial derivatives).
pub fn gradient_grid(nrows: usize, ncols: usize, lat0: f64, lon0: f64, step: f64) -> RasterGrid {
    let mut data = Vec::with_capacity(nrows * ncols);
    for row in 0..nrows {
        for col in 0..ncols {
            data.push((row + col) as f32);
        }
    }
    RasterGrid {
        header: header(nrows, ncols, lat0, lon0, step, step),
        data,
    }
}

/// A grid following an affine plane in geodetic coordinates,
/// `value = b0 + coeff_lat * lat + coeff_lon * lon`, where `lat`/`lon`
/// are each cell's centre. Gives the EKF a measurement model with
/// known, constant gradients, so a converged filter's final position
/// can be checked against an exact closed-form truth.
pub fn plane_grid(
    nrows: usize,
    ncols: usize,
    lat0: f64,
    lon0: f64,
    dlat: f64,
    dlon: f64,
    b0: f64,
    coeff_lat: f64,
    coeff_lon: f64,
) -> RasterGrid {
    let mut data = Vec::with_capacity(nrows * ncols);
    for row in 0..nrows {
        let lat = lat0 + row as f64 * dlat;
        for col in 0..ncols {
            let lon = lon0 + col as f64 * dlon;
            data.push((b0 + coeff_lat * lat + coeff_lon * lon) as f32);
        }
    }
    RasterGrid {
        header: header(nrows, ncols, lat0, lon0, dlat, dlon),
        data,
    }
}

/// A grid with a single `NaN` hole at `(row, col)`, useful for
/// exercising nodata propagation through the interpolation stencil.
pub fn grid_with_hole(
    nrows: usize,
    ncols: usize,
    hole: (usize, usize),
    lat0: f64,
    lon0: f64,
    dlat: f64,
    dlon: f64,
) -> RasterGrid {
    let mut grid = flat_grid(nrows, ncols, 100.0, lat0, lon0, dlat, dlon);
    let idx = hole.0 * ncols + hole.1;
    grid.data[idx] = f32::NAN;
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_grid_addresses_cells_correctly() {
        let grid = indexed_grid(5, 10, 0.0, 0.0, 1.0, 1.0);
        assert_eq!(grid.cell(1, 0), 10.0);
        assert_eq!(grid.cell(0, 1), 1.0);
    }

    #[test]
    fn grid_with_hole_isolates_a_single_nan() {
        let grid = grid_with_hole(4, 4, (2, 2), 0.0, 0.0, 1.0, 1.0);
        assert!(grid.cell(2, 2).is_nan());
        assert_eq!(grid.cell(0, 0), 100.0);
    }

    #[test]
    fn plane_grid_matches_closed_form_at_cell_centres() {
        let grid = plane_grid(10, 10, 0.0, 0.0, 0.1, 0.1, 1000.0, 500.0, 300.0);
        // cell (5, 5) is centred at lat=0.5, lon=0.5
        let expected = 1000.0 + 500.0 * 0.5 + 300.0 * 0.5;
        assert!((grid.cell(5, 5) as f64 - expected).abs() < 1e-3);
    }
}
