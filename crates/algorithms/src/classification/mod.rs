//! Green-space classification of band stacks
//!
//! - **Centroid**: pre-trained nearest-centroid model loaded from JSON
//! - **NDVI threshold**: mean NDVI over the period blocks above a cutoff
//! - **Median split**: first band above its median
//!
//! [`predict_green_space`] runs any [`PixelClassifier`] over the valid
//! pixels of a stack and summarizes the result.

mod classifier;
mod predict;

pub use classifier::{
    CentroidClassifier, ClassCentroid, MedianSplit, NdviThreshold, PixelClassifier,
    ThresholdParams, GREEN, NDVI_OFFSET, NOT_GREEN, PERIOD_STRIDE,
};
pub use predict::{predict_green_space, GreenSpacePrediction, PredictionSummary};
