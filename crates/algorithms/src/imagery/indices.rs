//! Spectral vegetation indices
//!
//! NDVI, EVI and SAVI from Sentinel-2 surface reflectance. All indices take
//! co-registered single-band `f32` rasters and return `f32` rasters with NaN
//! wherever an input is missing or the arithmetic is not finite (zero
//! denominators included).

use crate::maybe_rayon::*;
use greenstack_core::raster::Raster;
use greenstack_core::{Error, Result};
use ndarray::Array2;

/// Enumeration of the derived index bands, in stack order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    NDVI,
    /// Enhanced Vegetation Index
    EVI,
    /// Soil Adjusted Vegetation Index
    SAVI,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 3] = [SpectralIndex::NDVI, SpectralIndex::EVI, SpectralIndex::SAVI];

    /// Band label used in stacks
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::NDVI => "NDVI",
            SpectralIndex::EVI => "EVI",
            SpectralIndex::SAVI => "SAVI",
        }
    }
}

// ---------------------------------------------------------------------------
// NDVI
// ---------------------------------------------------------------------------

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// Values range from -1 to 1:
/// - Dense vegetation: 0.6 to 0.9
/// - Sparse vegetation: 0.2 to 0.5
/// - Bare soil: 0.1 to 0.2
/// - Water/clouds: -1.0 to 0.0
///
/// # Arguments
/// * `nir` - Near-infrared band (B08)
/// * `red` - Red band (B04)
pub fn ndvi(nir: &Raster<f32>, red: &Raster<f32>) -> Result<Raster<f32>> {
    check_dimensions(nir, red)?;

    let (rows, cols) = nir.shape();

    let data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f32::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let n = unsafe { nir.get_unchecked(row, col) };
                let r = unsafe { red.get_unchecked(row, col) };
                *out = finite_or_nan((n - r) / (n + r));
            }
            row_data
        })
        .collect();

    build_output(nir, rows, cols, data)
}

// ---------------------------------------------------------------------------
// SAVI
// ---------------------------------------------------------------------------

/// Parameters for SAVI
#[derive(Debug, Clone)]
pub struct SaviParams {
    /// Soil brightness correction factor (0 = high vegetation, 1 = low vegetation)
    /// Default: 0.5
    pub l_factor: f32,
}

impl Default for SaviParams {
    fn default() -> Self {
        Self { l_factor: 0.5 }
    }
}

/// Soil Adjusted Vegetation Index (Huete, 1988)
///
/// `SAVI = (NIR - Red) * (1 + L) / (NIR + Red + L)`
///
/// # Arguments
/// * `nir` - Near-infrared band
/// * `red` - Red band
/// * `params` - SAVI parameters (L factor)
pub fn savi(nir: &Raster<f32>, red: &Raster<f32>, params: SaviParams) -> Result<Raster<f32>> {
    check_dimensions(nir, red)?;

    let (rows, cols) = nir.shape();
    let l = params.l_factor;

    let data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f32::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let n = unsafe { nir.get_unchecked(row, col) };
                let r = unsafe { red.get_unchecked(row, col) };
                *out = finite_or_nan((n - r) * (1.0 + l) / (n + r + l));
            }
            row_data
        })
        .collect();

    build_output(nir, rows, cols, data)
}

// ---------------------------------------------------------------------------
// EVI
// ---------------------------------------------------------------------------

/// Parameters for EVI
#[derive(Debug, Clone)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f32,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f32,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f32,
    /// Canopy background adjustment (default: 1.0)
    pub l: f32,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Enhanced Vegetation Index (Huete et al., 2002)
///
/// `EVI = G * (NIR - Red) / (NIR + C1 * Red - C2 * Blue + L)`
///
/// More sensitive than NDVI in high biomass areas and reduces
/// atmospheric and soil noise.
pub fn evi(
    nir: &Raster<f32>,
    red: &Raster<f32>,
    blue: &Raster<f32>,
    params: EviParams,
) -> Result<Raster<f32>> {
    check_dimensions(nir, red)?;
    check_dimensions(nir, blue)?;

    let (rows, cols) = nir.shape();

    let data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f32::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let n = unsafe { nir.get_unchecked(row, col) };
                let r = unsafe { red.get_unchecked(row, col) };
                let b = unsafe { blue.get_unchecked(row, col) };
                let denom = n + params.c1 * r - params.c2 * b + params.l;
                *out = finite_or_nan(params.g * (n - r) / denom);
            }
            row_data
        })
        .collect();

    build_output(nir, rows, cols, data)
}

// ---------------------------------------------------------------------------
// All three at once
// ---------------------------------------------------------------------------

/// The four Sentinel-2 bands the indices are computed from
#[derive(Debug, Clone)]
pub struct SpectralSet {
    /// B02
    pub blue: Raster<f32>,
    /// B03
    pub green: Raster<f32>,
    /// B04
    pub red: Raster<f32>,
    /// B08
    pub nir: Raster<f32>,
}

/// NDVI, EVI and SAVI computed over one [`SpectralSet`]
#[derive(Debug, Clone)]
pub struct VegetationIndices {
    pub ndvi: Raster<f32>,
    pub evi: Raster<f32>,
    pub savi: Raster<f32>,
}

impl VegetationIndices {
    /// The indices in stack order with their labels
    pub fn into_labelled(self) -> [(SpectralIndex, Raster<f32>); 3] {
        [
            (SpectralIndex::NDVI, self.ndvi),
            (SpectralIndex::EVI, self.evi),
            (SpectralIndex::SAVI, self.savi),
        ]
    }
}

/// Compute NDVI, EVI and SAVI with default coefficients
pub fn vegetation_indices(bands: &SpectralSet) -> Result<VegetationIndices> {
    check_dimensions(&bands.nir, &bands.green)?;
    Ok(VegetationIndices {
        ndvi: ndvi(&bands.nir, &bands.red)?,
        evi: evi(&bands.nir, &bands.red, &bands.blue, EviParams::default())?,
        savi: savi(&bands.nir, &bands.red, SaviParams::default())?,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[inline]
fn finite_or_nan(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        f32::NAN
    }
}

fn check_dimensions(a: &Raster<f32>, b: &Raster<f32>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

fn build_output(
    template: &Raster<f32>,
    rows: usize,
    cols: usize,
    data: Vec<f32>,
) -> Result<Raster<f32>> {
    let mut output = template.with_same_meta::<f32>(rows, cols);
    output.set_nodata(Some(f32::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
