//! Per-pixel green-space classifiers
//!
//! Every classifier maps one pixel's band vector to a label, where `1` is
//! green space and `0` is not. Pixels reaching a classifier never contain
//! NaN.

use greenstack_core::raster::BandStack;
use greenstack_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Label for green-space pixels
pub const GREEN: u8 = 1;
/// Label for everything else
pub const NOT_GREEN: u8 = 0;

/// Offset of NDVI inside each seven-band period block
pub const NDVI_OFFSET: usize = 4;
/// Bands per period block
pub const PERIOD_STRIDE: usize = 7;

/// A classifier applied to one pixel at a time.
pub trait PixelClassifier: Sync {
    /// Minimum number of bands a pixel must carry
    fn n_bands_required(&self) -> usize;

    /// Label for one pixel; `pixel.len() >= self.n_bands_required()`.
    fn predict(&self, pixel: &[f32]) -> u8;
}

// ---- Nearest centroid ----

/// One class of a [`CentroidClassifier`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCentroid {
    pub label: u8,
    pub centroid: Vec<f32>,
}

/// Pre-trained nearest-centroid model.
///
/// Stored as JSON:
///
/// ```json
/// { "classes": [ { "label": 0, "centroid": [0.1, 0.2] },
///                { "label": 1, "centroid": [0.05, 0.6] } ] }
/// ```
///
/// A pixel takes the label of the class whose centroid is nearest in
/// squared Euclidean distance; ties go to the class listed first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidClassifier {
    classes: Vec<ClassCentroid>,
}

impl CentroidClassifier {
    pub fn new(classes: Vec<ClassCentroid>) -> Result<Self> {
        if classes.len() < 2 {
            return Err(Error::InvalidParameter {
                name: "classes",
                value: classes.len().to_string(),
                reason: "a centroid model needs at least 2 classes".into(),
            });
        }
        let n = classes[0].centroid.len();
        if n == 0 {
            return Err(Error::InvalidParameter {
                name: "centroid",
                value: "[]".into(),
                reason: "centroids must have at least one band".into(),
            });
        }
        if let Some(bad) = classes.iter().find(|c| c.centroid.len() != n) {
            return Err(Error::InvalidParameter {
                name: "centroid",
                value: format!("class {} has {} bands", bad.label, bad.centroid.len()),
                reason: format!("expected {} bands", n),
            });
        }
        if classes.iter().flat_map(|c| &c.centroid).any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "centroid",
                value: "non-finite".into(),
                reason: "centroid values must be finite".into(),
            });
        }
        Ok(Self { classes })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: CentroidClassifier = serde_json::from_str(text)?;
        Self::new(raw.classes)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn classes(&self) -> &[ClassCentroid] {
        &self.classes
    }
}

impl PixelClassifier for CentroidClassifier {
    fn n_bands_required(&self) -> usize {
        self.classes[0].centroid.len()
    }

    fn predict(&self, pixel: &[f32]) -> u8 {
        let mut best = (f32::INFINITY, NOT_GREEN);
        for class in &self.classes {
            let dist: f32 = class
                .centroid
                .iter()
                .zip(pixel)
                .map(|(c, v)| (v - c) * (v - c))
                .sum();
            if dist < best.0 {
                best = (dist, class.label);
            }
        }
        best.1
    }
}

// ---- NDVI threshold ----

/// Parameters for [`NdviThreshold`]
#[derive(Debug, Clone)]
pub struct ThresholdParams {
    /// Mean NDVI strictly above this is green (default 0.3)
    pub threshold: f32,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self { threshold: 0.3 }
    }
}

/// Mean NDVI over the period blocks of a stack, thresholded.
///
/// NDVI is read at offsets 4, 11 and 18 (one per period block) when the
/// stack is large enough to hold them. A smaller stack falls back to the
/// single band at offset `min(4, n - 1)`.
#[derive(Debug, Clone)]
pub struct NdviThreshold {
    offsets: Vec<usize>,
    threshold: f32,
}

impl NdviThreshold {
    pub fn new(n_bands: usize, params: ThresholdParams) -> Result<Self> {
        if n_bands == 0 {
            return Err(Error::NoInput("stack has no bands".into()));
        }
        Ok(Self {
            offsets: ndvi_offsets(n_bands),
            threshold: params.threshold,
        })
    }

    /// Band offsets averaged for each pixel
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}

fn ndvi_offsets(n_bands: usize) -> Vec<usize> {
    if n_bands >= 3 * PERIOD_STRIDE {
        (0..3).map(|p| NDVI_OFFSET + p * PERIOD_STRIDE).collect()
    } else {
        vec![NDVI_OFFSET.min(n_bands - 1)]
    }
}

impl PixelClassifier for NdviThreshold {
    fn n_bands_required(&self) -> usize {
        self.offsets.iter().max().map_or(1, |&o| o + 1)
    }

    fn predict(&self, pixel: &[f32]) -> u8 {
        let sum: f32 = self.offsets.iter().map(|&o| pixel[o]).sum();
        let mean = sum / self.offsets.len() as f32;
        if mean > self.threshold {
            GREEN
        } else {
            NOT_GREEN
        }
    }
}

// ---- Median split ----

/// Band 0 above a median computed from the valid pixels of a stack
#[derive(Debug, Clone)]
pub struct MedianSplit {
    median: f32,
}

impl MedianSplit {
    /// Use a median computed elsewhere
    pub fn new(median: f32) -> Self {
        Self { median }
    }

    /// Median of the non-NaN values in `values`
    pub fn from_values(values: &[f32]) -> Result<Self> {
        let mut valid: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() {
            return Err(Error::NoInput("no valid pixels to compute a median".into()));
        }
        valid.sort_by(f32::total_cmp);
        let mid = valid.len() / 2;
        let median = if valid.len() % 2 == 0 {
            (valid[mid - 1] + valid[mid]) / 2.0
        } else {
            valid[mid]
        };
        Ok(Self { median })
    }

    /// Median of band 0 over the pixels that are valid in every band, the
    /// same pixels [`predict_green_space`](super::predict_green_space)
    /// classifies.
    pub fn from_stack(stack: &BandStack) -> Result<Self> {
        let Some(first) = stack.band(0) else {
            return Err(Error::NoInput("band stack is empty".into()));
        };
        let bands = stack.bands();
        let values: Vec<f32> = first
            .data()
            .indexed_iter()
            .filter(|&(idx, _)| bands.iter().all(|b| !b.data()[idx].is_nan()))
            .map(|(_, &v)| v)
            .collect();
        Self::from_values(&values)
    }

    pub fn median(&self) -> f32 {
        self.median
    }
}

impl PixelClassifier for MedianSplit {
    fn n_bands_required(&self) -> usize {
        1
    }

    fn predict(&self, pixel: &[f32]) -> u8 {
        if pixel[0] > self.median {
            GREEN
        } else {
            NOT_GREEN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndvi_offsets() {
        assert_eq!(ndvi_offsets(21), vec![4, 11, 18]);
        assert_eq!(ndvi_offsets(28), vec![4, 11, 18]);
        assert_eq!(ndvi_offsets(20), vec![4]);
        assert_eq!(ndvi_offsets(14), vec![4]);
        assert_eq!(ndvi_offsets(7), vec![4]);
        assert_eq!(ndvi_offsets(3), vec![2]);
        assert_eq!(ndvi_offsets(1), vec![0]);
    }

    #[test]
    fn test_threshold_uses_mean_ndvi() {
        let clf = NdviThreshold::new(21, ThresholdParams::default()).unwrap();
        assert_eq!(clf.n_bands_required(), 19);

        let mut pixel = vec![0.0f32; 21];
        pixel[4] = 0.8;
        pixel[11] = 0.1;
        pixel[18] = 0.1;
        // mean 0.333
        assert_eq!(clf.predict(&pixel), GREEN);

        pixel[4] = 0.4;
        // mean 0.2
        assert_eq!(clf.predict(&pixel), NOT_GREEN);

        assert!(NdviThreshold::new(0, ThresholdParams::default()).is_err());
    }

    #[test]
    fn test_centroid_model() {
        let json = r#"{"classes": [
            {"label": 0, "centroid": [0.2, 0.1]},
            {"label": 1, "centroid": [0.05, 0.7]}
        ]}"#;
        let clf = CentroidClassifier::from_json_str(json).unwrap();
        assert_eq!(clf.n_bands_required(), 2);
        assert_eq!(clf.predict(&[0.06, 0.65]), GREEN);
        assert_eq!(clf.predict(&[0.25, 0.05]), NOT_GREEN);
    }

    #[test]
    fn test_centroid_model_validation() {
        assert!(CentroidClassifier::from_json_str("{\"classes\": []}").is_err());
        assert!(CentroidClassifier::from_json_str("not json").is_err());

        let ragged = vec![
            ClassCentroid { label: 0, centroid: vec![0.1, 0.2] },
            ClassCentroid { label: 1, centroid: vec![0.1] },
        ];
        assert!(matches!(
            CentroidClassifier::new(ragged),
            Err(Error::InvalidParameter { name: "centroid", .. })
        ));
    }

    #[test]
    fn test_median_split() {
        let split = MedianSplit::from_values(&[4.0, 1.0, f32::NAN, 3.0, 2.0]).unwrap();
        assert_eq!(split.median(), 2.5);
        assert_eq!(split.predict(&[3.0]), GREEN);
        assert_eq!(split.predict(&[2.5]), NOT_GREEN);

        assert!(MedianSplit::from_values(&[f32::NAN]).is_err());
    }

    #[test]
    fn test_median_split_from_stack_uses_valid_pixels_only() {
        use greenstack_core::raster::Raster;

        let mut stack = BandStack::new();
        let first = Raster::from_vec(vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0], 2, 3).unwrap();
        let second = Raster::from_vec(vec![f32::NAN, f32::NAN, 0.5, 0.5, 0.5, 0.5], 2, 3).unwrap();
        stack.push("first", first).unwrap();
        stack.push("second", second).unwrap();

        // Pixels 0 and 1 are NaN in the second band, so only 3, 10, 11, 12 count
        let split = MedianSplit::from_stack(&stack).unwrap();
        assert_eq!(split.median(), 10.5);

        assert!(MedianSplit::from_stack(&BandStack::new()).is_err());
    }
}
