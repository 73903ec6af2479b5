//! Apply a pixel classifier to a band stack

use super::classifier::{PixelClassifier, GREEN};
use crate::maybe_rayon::*;
use greenstack_core::raster::{BandStack, Raster};
use greenstack_core::{Error, Result};
use ndarray::Array2;
use serde::Serialize;
use tracing::info;

/// Counts reported with a prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub green_pixels: usize,
    /// Pixels with a non-NaN value in every band
    pub total_pixels: usize,
    pub green_percentage: f64,
    /// `"<rows>×<cols>"`
    pub dimensions: String,
    pub n_bands: usize,
}

/// Label grid plus its summary
#[derive(Debug, Clone)]
pub struct GreenSpacePrediction {
    /// 1 for green, 0 for not green, NaN where any input band is NaN
    pub labels: Raster<f32>,
    pub summary: PredictionSummary,
}

/// Classify every valid pixel of `stack`.
///
/// A pixel is valid when none of its bands is NaN. Invalid pixels are
/// never handed to the classifier and come out as NaN.
pub fn predict_green_space(
    stack: &BandStack,
    classifier: &dyn PixelClassifier,
) -> Result<GreenSpacePrediction> {
    let Some(first) = stack.band(0) else {
        return Err(Error::NoInput("band stack is empty".into()));
    };
    let n_bands = stack.len();
    let required = classifier.n_bands_required();
    if n_bands < required {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: n_bands.to_string(),
            reason: format!("classifier needs at least {} bands", required),
        });
    }

    let (rows, cols) = first.shape();
    let bands = stack.bands();

    let data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f32::NAN; cols];
            let mut pixel = Vec::with_capacity(n_bands);
            for (col, out) in row_data.iter_mut().enumerate() {
                pixel.clear();
                pixel.extend(bands.iter().map(|b| unsafe { b.get_unchecked(row, col) }));
                if !pixel.iter().any(|v| v.is_nan()) {
                    *out = f32::from(classifier.predict(&pixel));
                }
            }
            row_data
        })
        .collect();

    let total_pixels = data.iter().filter(|v| !v.is_nan()).count();
    let green_pixels = data.iter().filter(|&&v| v == f32::from(GREEN)).count();
    let green_percentage = if total_pixels > 0 {
        green_pixels as f64 / total_pixels as f64 * 100.0
    } else {
        0.0
    };

    let mut labels = first.with_same_meta::<f32>(rows, cols);
    labels.set_nodata(Some(f32::NAN));
    *labels.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    let summary = PredictionSummary {
        green_pixels,
        total_pixels,
        green_percentage,
        dimensions: format!("{}×{}", rows, cols),
        n_bands,
    };
    info!(
        green = summary.green_pixels,
        valid = summary.total_pixels,
        pct = summary.green_percentage,
        "prediction complete"
    );

    Ok(GreenSpacePrediction { labels, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{MedianSplit, NdviThreshold, ThresholdParams};
    use approx::assert_relative_eq;
    use greenstack_core::{GeoTransform, CRS};

    /// Seven-band single-period stack where NDVI (band 4) is `ndvi`
    fn period_stack(ndvi: Vec<f32>) -> BandStack {
        let mut stack = BandStack::new();
        for b in 0..7 {
            let values = if b == 4 { ndvi.clone() } else { vec![0.1; 4] };
            let mut r = Raster::from_vec(values, 2, 2).unwrap();
            r.set_transform(GeoTransform::new(100.0, 200.0, 10.0, -10.0));
            r.set_crs(Some(CRS::from_epsg(32756)));
            stack.push(format!("band{}", b), r).unwrap();
        }
        stack
    }

    #[test]
    fn test_threshold_prediction() {
        let stack = period_stack(vec![0.8, 0.1, 0.5, 0.2]);
        let clf = NdviThreshold::new(stack.len(), ThresholdParams::default()).unwrap();

        let pred = predict_green_space(&stack, &clf).unwrap();
        assert_eq!(pred.labels.get(0, 0).unwrap(), 1.0);
        assert_eq!(pred.labels.get(0, 1).unwrap(), 0.0);
        assert_eq!(pred.labels.get(1, 0).unwrap(), 1.0);
        assert_eq!(pred.summary.green_pixels, 2);
        assert_eq!(pred.summary.total_pixels, 4);
        assert_relative_eq!(pred.summary.green_percentage, 50.0);
        assert_eq!(pred.summary.dimensions, "2×2");
        assert_eq!(pred.summary.n_bands, 7);
        assert_eq!(pred.labels.crs().unwrap().epsg(), Some(32756));
        assert_relative_eq!(pred.labels.transform().origin_x, 100.0);
    }

    #[test]
    fn test_nan_pixels_are_excluded() {
        let stack = period_stack(vec![0.8, f32::NAN, 0.1, 0.1]);
        let clf = NdviThreshold::new(stack.len(), ThresholdParams::default()).unwrap();

        let pred = predict_green_space(&stack, &clf).unwrap();
        assert!(pred.labels.get(0, 1).unwrap().is_nan());
        assert_eq!(pred.summary.total_pixels, 3);
        assert_eq!(pred.summary.green_pixels, 1);
        assert_relative_eq!(pred.summary.green_percentage, 100.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_only_nan_marks_missing() {
        let stack = period_stack(vec![f32::INFINITY, f32::NEG_INFINITY, f32::NAN, 0.1]);
        let clf = NdviThreshold::new(stack.len(), ThresholdParams::default()).unwrap();

        let pred = predict_green_space(&stack, &clf).unwrap();
        assert_eq!(pred.labels.get(0, 0).unwrap(), 1.0);
        assert_eq!(pred.labels.get(0, 1).unwrap(), 0.0);
        assert!(pred.labels.get(1, 0).unwrap().is_nan());
        assert_eq!(pred.summary.total_pixels, 3);
    }

    #[test]
    fn test_all_invalid_gives_zero_percent() {
        let stack = period_stack(vec![f32::NAN; 4]);
        let pred = predict_green_space(&stack, &MedianSplit::new(0.0)).unwrap();
        assert_eq!(pred.summary.total_pixels, 0);
        assert_eq!(pred.summary.green_percentage, 0.0);
    }

    #[test]
    fn test_too_few_bands() {
        let stack = period_stack(vec![0.5; 4]);
        let clf = NdviThreshold::new(21, ThresholdParams::default()).unwrap();
        assert!(matches!(
            predict_green_space(&stack, &clf),
            Err(Error::InvalidParameter { name: "bands", .. })
        ));
        assert!(matches!(
            predict_green_space(&BandStack::new(), &clf),
            Err(Error::NoInput(_))
        ));
    }

    #[test]
    fn test_summary_serializes() {
        let stack = period_stack(vec![0.8, 0.1, 0.5, 0.2]);
        let clf = NdviThreshold::new(7, ThresholdParams::default()).unwrap();
        let pred = predict_green_space(&stack, &clf).unwrap();

        let json = serde_json::to_value(&pred.summary).unwrap();
        assert_eq!(json["green_pixels"], 2);
        assert_eq!(json["dimensions"], "2×2");
        assert_eq!(json["n_bands"], 7);
    }
}
