//! Ordered collection of labelled, co-registered bands

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};

/// Tolerance (map units) when comparing band transforms
const TRANSFORM_TOLERANCE: f64 = 1e-6;

/// An ordered set of `f32` bands sharing one grid.
///
/// Every band has the same shape, transform and CRS as the first band
/// pushed. Labels are kept in insertion order and are written to disk as
/// band descriptions.
#[derive(Debug, Clone, Default)]
pub struct BandStack {
    bands: Vec<Raster<f32>>,
    labels: Vec<String>,
}

impl BandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a band, validating it against the bands already present.
    pub fn push(&mut self, label: impl Into<String>, band: Raster<f32>) -> Result<()> {
        let label = label.into();

        if let Some(first) = self.bands.first() {
            let (er, ec) = first.shape();
            let (ar, ac) = band.shape();
            if (er, ec) != (ar, ac) {
                return Err(Error::SizeMismatch { er, ec, ar, ac });
            }
            if !first
                .transform()
                .approx_eq(band.transform(), TRANSFORM_TOLERANCE)
            {
                return Err(Error::TransformMismatch { label });
            }
            if let (Some(a), Some(b)) = (first.crs(), band.crs()) {
                if !a.is_equivalent(b) {
                    return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
                }
            }
        }

        self.labels.push(label);
        self.bands.push(band);
        Ok(())
    }

    /// Append every band of another stack, preserving its order.
    pub fn extend(&mut self, other: BandStack) -> Result<()> {
        for (label, band) in other.labels.into_iter().zip(other.bands) {
            self.push(label, band)?;
        }
        Ok(())
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Band labels in order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Band at position `index` (0-based)
    pub fn band(&self, index: usize) -> Option<&Raster<f32>> {
        self.bands.get(index)
    }

    /// First band carrying `label`
    pub fn band_by_label(&self, label: &str) -> Option<&Raster<f32>> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.bands.get(i))
    }

    pub fn bands(&self) -> &[Raster<f32>] {
        &self.bands
    }

    /// Iterate over `(label, band)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster<f32>)> {
        self.labels.iter().map(String::as_str).zip(self.bands.iter())
    }

    /// Grid shape `(rows, cols)`, or `(0, 0)` for an empty stack
    pub fn shape(&self) -> (usize, usize) {
        self.bands.first().map_or((0, 0), Raster::shape)
    }

    /// Shared geotransform
    pub fn transform(&self) -> Option<&GeoTransform> {
        self.bands.first().map(Raster::transform)
    }

    /// Shared CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.bands.iter().find_map(Raster::crs)
    }

    /// Fill `out` with every band's value at `(row, col)`.
    ///
    /// `out` is cleared first; callers reuse it across pixels.
    pub fn pixel_into(&self, row: usize, col: usize, out: &mut Vec<f32>) -> Result<()> {
        out.clear();
        for band in &self.bands {
            out.push(band.get(row, col)?);
        }
        Ok(())
    }

    /// Consume the stack into `(labels, bands)`
    pub fn into_parts(self) -> (Vec<String>, Vec<Raster<f32>>) {
        (self.labels, self.bands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(value: f32) -> Raster<f32> {
        let mut r = Raster::filled(3, 4, value);
        r.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32630)));
        r
    }

    #[test]
    fn test_push_keeps_order() {
        let mut stack = BandStack::new();
        stack.push("B04", band(1.0)).unwrap();
        stack.push("B08", band(2.0)).unwrap();
        stack.push("NDVI", band(0.3)).unwrap();

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.labels(), ["B04", "B08", "NDVI"]);
        assert_eq!(stack.band_by_label("B08").unwrap().get(0, 0).unwrap(), 2.0);
        assert_eq!(stack.shape(), (3, 4));
        assert_eq!(stack.crs().unwrap().epsg(), Some(32630));
    }

    #[test]
    fn test_push_rejects_shape_mismatch() {
        let mut stack = BandStack::new();
        stack.push("B04", band(1.0)).unwrap();
        let wrong = Raster::filled(2, 4, 0.0f32);
        assert!(matches!(
            stack.push("B08", wrong),
            Err(Error::SizeMismatch { er: 3, ec: 4, ar: 2, ac: 4 })
        ));
    }

    #[test]
    fn test_push_rejects_shifted_grid() {
        let mut stack = BandStack::new();
        stack.push("B04", band(1.0)).unwrap();
        let mut shifted = band(2.0);
        shifted.set_transform(GeoTransform::new(500_010.0, 4_000_000.0, 10.0, -10.0));
        assert!(matches!(
            stack.push("B08", shifted),
            Err(Error::TransformMismatch { .. })
        ));
    }

    #[test]
    fn test_pixel_into() {
        let mut stack = BandStack::new();
        stack.push("a", band(1.0)).unwrap();
        stack.push("b", band(2.0)).unwrap();

        let mut px = vec![99.0];
        stack.pixel_into(2, 3, &mut px).unwrap();
        assert_eq!(px, vec![1.0, 2.0]);
    }
}
