//! # Greenstack Algorithms
//!
//! Raster processing for Sentinel-2 green-space mapping.
//!
//! ## Modules
//!
//! - **imagery**: NDVI, EVI, SAVI
//! - **clip**: clip a raster to an area of interest
//! - **mosaic**: merge co-gridded tiles
//! - **stack**: multi-period band stacking
//! - **classification**: per-pixel green-space classifiers
//! - **landcover**: ESA WorldCover class summary

pub mod classification;
pub mod clip;
pub mod imagery;
pub mod landcover;
pub mod mosaic;
pub mod stack;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        predict_green_space, CentroidClassifier, GreenSpacePrediction, MedianSplit,
        NdviThreshold, PixelClassifier, PredictionSummary, ThresholdParams,
    };
    pub use crate::clip::clip_raster;
    pub use crate::imagery::{evi, ndvi, savi, vegetation_indices, SpectralIndex, SpectralSet};
    pub use crate::landcover::{summarize_landcover, LandCoverClass, LandCoverSummary};
    pub use crate::mosaic::mosaic;
    pub use crate::stack::{
        stack_periods, stack_single, BandSource, MissingBandPolicy, Period, PeriodInput,
        SpectralBand, StackOutcome, StackParams,
    };
    pub use greenstack_core::prelude::*;
}
