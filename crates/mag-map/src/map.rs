//! `MagneticMap`: composes a raster source, the tile cache, and the
//! interpolator behind one `interpolate` call.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use nav_common::{MapHeader, NavError, NavResult, RasterGrid};

use crate::cache::{TileCache, TileKey};
use crate::interpolation::{self, InterpolationMethod};
use crate::source::{self, MapFormat, RasterSource};

/// Default tile edge length, in grid cells.
pub const DEFAULT_TILE_SIZE: usize = 256;
/// Default number of resident tiles.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 16;

/// A loaded magnetic anomaly map, safe to query concurrently.
///
/// `source` is the backing store `geotiff-loader`/`netcdf-loader` hand
/// back: both fully materialize their file into memory on load, the
/// way a `GDAL`/`netcdf` library binding would, so it is not itself a
/// bound on residency. The tile cache is what every interpolation
/// query actually reads from: `interpolate` warms the stencil's tiles
/// through the cache (single-flight per tile), then reads the
/// stencil's cells back out of the cache's resident tile payloads via
/// [`TiledView`], never touching `source` directly on the read path.
/// `cache_stats()` therefore reflects genuine tile residency. Size the
/// cache capacity to comfortably exceed the widest supported stencil
/// (9 tiles for bicubic at the default 256-cell tile edge): a capacity
/// below that degrades correctness, not just hit rate.
pub struct MagneticMap {
    source: Arc<RasterGrid>,
    cache: TileCache,
    tile_size: usize,
}

/// A read-only view over a stencil's tiles, already warmed through
/// the cache, implementing [`RasterSource`] so the interpolator can
/// stay agnostic of tiling entirely.
struct TiledView<'a> {
    header: &'a MapHeader,
    tile_size: usize,
    tiles: std::collections::HashMap<TileKey, Arc<Vec<f32>>>,
}

impl<'a> RasterSource for TiledView<'a> {
    fn header(&self) -> &MapHeader {
        self.header
    }

    fn cell(&self, i: usize, j: usize) -> f32 {
        let tile_row = i / self.tile_size;
        let tile_col = j / self.tile_size;
        let row0 = tile_row * self.tile_size;
        let col0 = tile_col * self.tile_size;
        let tile_ncols = self.tile_size.min(self.header.ncols.saturating_sub(col0));

        match self.tiles.get(&(tile_row, tile_col)) {
            Some(tile) => {
                let local = (i - row0) * tile_ncols + (j - col0);
                tile.get(local).copied().unwrap_or(f32::NAN)
            }
            // Every tile the stencil touches is warmed just before this
            // view is built; a miss here means the cache evicted it
            // again before the read, which only happens if the cache's
            // capacity is smaller than the stencil's tile footprint.
            None => f32::NAN,
        }
    }
}

impl MagneticMap {
    /// Load a map from a file, inferring its format from the extension.
    pub fn open(path: impl AsRef<Path>) -> NavResult<Self> {
        let format = MapFormat::from_extension(path.as_ref())?;
        Self::open_as(path, format, DEFAULT_TILE_CACHE_CAPACITY, DEFAULT_TILE_SIZE)
    }

    /// Load a map from a file with an explicit format and cache sizing.
    pub fn open_as(
        path: impl AsRef<Path>,
        format: MapFormat,
        tile_cache_capacity: usize,
        tile_size: usize,
    ) -> NavResult<Self> {
        let path = path.as_ref();
        let grid = source::load_source(path, format).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to load magnetic anomaly map");
            e
        })?;
        Self::from_grid(grid, tile_cache_capacity, tile_size)
    }

    /// Wrap an already-parsed raster grid.
    pub fn from_grid(
        grid: RasterGrid,
        tile_cache_capacity: usize,
        tile_size: usize,
    ) -> NavResult<Self> {
        if tile_size == 0 {
            return Err(NavError::Config("tile size must be > 0".into()));
        }
        Ok(Self {
            source: Arc::new(grid),
            cache: TileCache::new(tile_cache_capacity)?,
            tile_size,
        })
    }

    pub fn header(&self) -> &MapHeader {
        self.source.header()
    }

    pub fn cache_stats(&self) -> &crate::cache::TileCacheStats {
        self.cache.stats()
    }

    /// Interpolate the field value at `(lat, lon)`.
    ///
    /// Warms every tile the requested stencil touches through the
    /// tile cache (single-flight per tile), then reads the stencil's
    /// cells back out of those cached tile payloads. The resident
    /// `source` backing store is consulted only to extract a tile on
    /// a cache miss, never on the read path itself.
    pub async fn interpolate(
        &self,
        lat: f64,
        lon: f64,
        method: InterpolationMethod,
    ) -> NavResult<f64> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(NavError::Domain("non-finite query coordinates".into()));
        }

        let header = self.source.header();
        let (row, col) = header.frac_index(lat, lon);

        let pad: i64 = match method {
            InterpolationMethod::Bilinear => 1,
            InterpolationMethod::Bicubic => 2,
        };
        let i0 = row.floor() as i64;
        let j0 = col.floor() as i64;

        let keys = self.touched_tiles(i0 - (pad - 1), j0 - (pad - 1), i0 + pad, j0 + pad, header);

        let mut tiles = std::collections::HashMap::with_capacity(keys.len());
        for key in keys {
            self.warm_tile(key).await?;
            let tile = self.cache.peek(&key).await.ok_or_else(|| {
                NavError::Numeric(format!(
                    "tile {key:?} was evicted before its stencil read; \
                     increase the tile cache capacity beyond the widest supported stencil"
                ))
            })?;
            tiles.insert(key, tile);
        }

        let view = TiledView {
            header,
            tile_size: self.tile_size,
            tiles,
        };

        interpolation::interpolate(&view, lat, lon, method)
    }

    fn touched_tiles(
        &self,
        i_lo: i64,
        j_lo: i64,
        i_hi: i64,
        j_hi: i64,
        header: &MapHeader,
    ) -> HashSet<TileKey> {
        let mut tiles = HashSet::new();
        if header.nrows == 0 || header.ncols == 0 {
            return tiles;
        }

        let i_lo = i_lo.clamp(0, header.nrows as i64 - 1);
        let i_hi = i_hi.clamp(0, header.nrows as i64 - 1);
        let j_lo = j_lo.clamp(0, header.ncols as i64 - 1);
        let j_hi = j_hi.clamp(0, header.ncols as i64 - 1);

        for i in i_lo..=i_hi {
            for j in j_lo..=j_hi {
                tiles.insert((i as usize / self.tile_size, j as usize / self.tile_size));
            }
        }
        tiles
    }

    async fn warm_tile(&self, key: TileKey) -> NavResult<()> {
        let source = self.source.clone();
        let tile_size = self.tile_size;
        self.cache
            .get_or_load(key, move || async move { Ok(extract_tile(&source, key, tile_size)) })
            .await?;
        Ok(())
    }
}

fn extract_tile(source: &RasterGrid, key: TileKey, tile_size: usize) -> Vec<f32> {
    let header = source.header();
    let (tile_row, tile_col) = key;
    let row0 = tile_row * tile_size;
    let col0 = tile_col * tile_size;
    let nrows = tile_size.min(header.nrows.saturating_sub(row0));
    let ncols = tile_size.min(header.ncols.saturating_sub(col0));

    let mut data = Vec::with_capacity(nrows * ncols);
    for i in 0..nrows {
        for j in 0..ncols {
            data.push(source.cell(row0 + i, col0 + j));
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_grid() -> RasterGrid {
        test_support::indexed_grid(10, 10, 0.0, 0.0, 1.0, 1.0)
    }

    #[tokio::test]
    async fn interpolate_hits_cell_centre_exactly() {
        let map = MagneticMap::from_grid(test_grid(), 4, 4).unwrap();
        let v = map
            .interpolate(3.0, 4.0, InterpolationMethod::Bilinear)
            .await
            .unwrap();
        assert_eq!(v, 34.0);
    }

    #[tokio::test]
    async fn interpolate_out_of_map_errors() {
        let map = MagneticMap::from_grid(test_grid(), 4, 4).unwrap();
        let err = map
            .interpolate(100.0, 100.0, InterpolationMethod::Bilinear)
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::OutOfMap { .. }));
    }

    #[tokio::test]
    async fn repeated_queries_reuse_cached_tiles() {
        let map = MagneticMap::from_grid(test_grid(), 4, 4).unwrap();
        for _ in 0..5 {
            map.interpolate(3.2, 4.3, InterpolationMethod::Bilinear)
                .await
                .unwrap();
        }
        assert!(map.cache_stats().hits.load(std::sync::atomic::Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn read_path_is_served_from_cached_tile_payloads() {
        // Tile 4 cells wide, cache holds only 1 tile: the first query's
        // stencil spans two tiles (row centred at a tile boundary), so
        // reading through the cache exercises both a cold load and the
        // view assembled purely from those cached payloads.
        let map = MagneticMap::from_grid(test_grid(), 2, 4).unwrap();
        let v = map
            .interpolate(3.0, 4.0, InterpolationMethod::Bilinear)
            .await
            .unwrap();
        assert_eq!(v, 34.0);
        // Exactly the tiles the stencil touches are resident; the cache
        // is genuinely bounding what is read, not bypassed.
        assert!(map.cache_stats().misses.load(std::sync::atomic::Ordering::Relaxed) >= 1);
        assert!(map.cache.len().await <= 2);
    }
}
