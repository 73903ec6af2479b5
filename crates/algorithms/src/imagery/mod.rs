//! Imagery analysis algorithms
//!
//! Spectral vegetation indices for Sentinel-2: NDVI, EVI, SAVI.

mod indices;

pub use indices::{
    evi, ndvi, savi, vegetation_indices, EviParams, SaviParams, SpectralIndex, SpectralSet,
    VegetationIndices,
};
