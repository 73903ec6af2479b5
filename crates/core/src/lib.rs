//! # greenstack core
//!
//! Core types and I/O for the greenstack Sentinel-2 toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced grid
//! - `BandStack`: Ordered, labelled, co-registered `f32` bands
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling and reprojection
//! - `Aoi`: Area-of-interest polygons parsed from GeoJSON
//! - GeoTIFF reading and writing (single band and multi-band stacks)

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{BandStack, GeoTransform, Raster, RasterElement};
pub use vector::Aoi;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BandStack, GeoTransform, Raster, RasterElement};
    pub use crate::vector::Aoi;
}
