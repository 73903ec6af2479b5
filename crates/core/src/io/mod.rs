//! I/O operations for reading and writing geospatial data

#[cfg(feature = "gdal")]
mod gdal_io;
mod metadata;
mod native;

#[cfg(feature = "gdal")]
pub use gdal_io::{read_geotiff, read_stack, write_geotiff, write_stack, GeoTiffOptions};

#[cfg(not(feature = "gdal"))]
pub use native::{read_geotiff, read_stack, write_geotiff, write_stack, GeoTiffOptions};

// Buffer-based I/O (always available, no filesystem dependency)
pub use native::{
    read_geotiff_from_buffer, read_stack_from_buffer, write_geotiff_to_buffer,
    write_stack_to_buffer,
};

use crate::error::Result;
use crate::raster::Raster;
use std::path::Path;

/// Read the first band of a raster as `f32`, with no-data cells as NaN.
///
/// This is how spectral band files enter the processing pipeline: integer
/// reflectance with a sentinel value becomes float with NaN gaps.
pub fn read_band_f32<P: AsRef<Path>>(path: P) -> Result<Raster<f32>> {
    let raster: Raster<f32> = read_geotiff(path, Some(1))?;
    Ok(raster.to_f32_masked())
}
