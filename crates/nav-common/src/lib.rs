//! Shared types and error handling for the qmag-nav workspace.

pub mod error;
pub mod raster;

pub use error::{ErrorPayload, NavError, NavResult};
pub use raster::{MapHeader, RasterGrid, TileMetadata};
