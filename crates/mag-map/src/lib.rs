//! Map engine: raster source loading, interpolation, and a
//! single-flight tile cache, composed behind [`MagneticMap`].

pub mod cache;
pub mod interpolation;
pub mod map;
pub mod source;

pub use cache::{TileCache, TileCacheStats, TileKey};
pub use interpolation::InterpolationMethod;
pub use map::{MagneticMap, DEFAULT_TILE_CACHE_CAPACITY, DEFAULT_TILE_SIZE};
pub use source::{load_source, MapFormat, RasterSource};
