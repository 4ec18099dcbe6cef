//! Reads single-band, regular-affine GeoTIFF-like rasters (no rotation)
//! into the workspace's common [`RasterGrid`] representation.
//!
//! Georeferencing is read from the standard GeoTIFF tags
//! `ModelPixelScaleTag` (33550) and `ModelTiepointTag` (33922). A raster
//! lacking those tags fails with [`NavError::MapFormat`] rather than
//! silently guessing an origin.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use nav_common::{MapHeader, NavError, NavResult, RasterGrid};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;

/// Default nodata sentinel used when the source carries none.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Load a GeoTIFF-like raster from a filesystem path.
pub fn load(path: impl AsRef<Path>) -> NavResult<RasterGrid> {
    let file = File::open(path.as_ref())
        .map_err(|e| NavError::MapIo(format!("failed to open {:?}: {e}", path.as_ref())))?;
    load_reader(BufReader::new(file))
}

/// Load a GeoTIFF-like raster from an in-memory byte buffer.
pub fn load_bytes(bytes: &[u8]) -> NavResult<RasterGrid> {
    load_reader(std::io::Cursor::new(bytes))
}

fn load_reader<R: Read + Seek>(reader: R) -> NavResult<RasterGrid> {
    let mut decoder =
        Decoder::new(reader).map_err(|e| NavError::MapIo(format!("invalid TIFF: {e}")))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| NavError::MapIo(format!("failed to read TIFF dimensions: {e}")))?;
    let (ncols, nrows) = (width as usize, height as usize);

    let pixel_scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE_TAG))
        .map_err(|_| {
            NavError::MapFormat("missing ModelPixelScaleTag (33550); raster is not georeferenced".into())
        })?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT_TAG))
        .map_err(|_| {
            NavError::MapFormat("missing ModelTiepointTag (33922); raster is not georeferenced".into())
        })?;

    if pixel_scale.len() < 2 || tiepoint.len() < 6 {
        return Err(NavError::MapFormat(
            "malformed GeoTIFF georeferencing tags".into(),
        ));
    }

    // ModelTiepointTag = (I, J, K, X, Y, Z): raster point (I, J) maps to
    // model-space point (X, Y). We require I == J == 0 (no rotation, top-left anchor).
    let (tie_i, tie_j, origin_x, origin_y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    if tie_i != 0.0 || tie_j != 0.0 {
        return Err(NavError::MapFormat(
            "GeoTIFF tiepoint is not anchored at the top-left pixel; rotated or offset rasters are unsupported".into(),
        ));
    }

    let dlon = pixel_scale[0];
    let dlat = -pixel_scale[1]; // scale-Y is always positive magnitude; rows increase southward.
    let lon0 = origin_x;
    let lat0 = origin_y;

    let image = decoder
        .read_image()
        .map_err(|e| NavError::MapIo(format!("failed to decode TIFF pixel data: {e}")))?;

    let raw: Vec<f32> = match image {
        DecodingResult::F32(v) => v,
        DecodingResult::U8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        other => {
            return Err(NavError::MapFormat(format!(
                "unsupported TIFF sample format: {other:?}"
            )))
        }
    };

    if raw.len() != nrows * ncols {
        return Err(NavError::MapFormat(format!(
            "decoded pixel count {} does not match dimensions {}x{}",
            raw.len(),
            nrows,
            ncols
        )));
    }

    let nodata_sentinel = DEFAULT_NODATA;
    let data: Vec<f32> = raw
        .into_iter()
        .map(|v| if v == nodata_sentinel { f32::NAN } else { v })
        .collect();

    let header = MapHeader {
        nrows,
        ncols,
        lat0,
        lon0,
        dlat,
        dlon,
        nodata_sentinel,
    };

    tracing::debug!(nrows, ncols, lat0, lon0, dlat, dlon, "loaded GeoTIFF-like raster");

    Ok(RasterGrid { header, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_bytes() {
        let result = load_bytes(b"not a tiff file at all");
        assert!(result.is_err());
    }
}
