//! Raster reading and writing through GDAL
//!
//! Reads any GDAL format, including the JPEG2000 tiles Sentinel-2 ships.
//! Writes GeoTIFF with band descriptions set from stack labels.

use crate::crs::CRS;
use crate::error::Result;
use crate::raster::{BandStack, GeoTransform, Raster, RasterElement};
use gdal::raster::{Buffer, GdalType, RasterCreationOptions};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use std::path::Path;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression type: "DEFLATE", "LZW", "ZSTD", "NONE"
    pub compression: String,
    /// Tile size for tiled TIFFs (0 for strips)
    pub tile_size: usize,
    /// BigTIFF for files > 4GB
    pub bigtiff: bool,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "DEFLATE".to_string(),
            tile_size: 256,
            bigtiff: false,
        }
    }
}

/// Read one band of a raster file into a Raster
///
/// # Arguments
/// * `path` - Path to any GDAL-readable raster (`.tif`, `.jp2`, ...)
/// * `band` - Band number (1-indexed), defaults to 1
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    read_band(&dataset, band.unwrap_or(1))
}

/// Read every band of a raster file into a [`BandStack`].
///
/// Labels are the band descriptions, falling back to `band_<n>`.
pub fn read_stack<P: AsRef<Path>>(path: P) -> Result<BandStack> {
    let dataset = Dataset::open(path.as_ref())?;

    let mut stack = BandStack::new();
    for index in 1..=dataset.raster_count() {
        let band: Raster<f32> = read_band(&dataset, index)?;
        let label = dataset
            .rasterband(index)?
            .description()
            .ok()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("band_{}", index));
        stack.push(label, band.to_f32_masked())?;
    }
    Ok(stack)
}

fn read_band<T>(dataset: &Dataset, index: usize) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
{
    let rasterband = dataset.rasterband(index)?;
    let (cols, rows) = dataset.raster_size();

    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;
    let mut raster = Raster::from_vec(buffer.data().to_vec(), rows, cols)?;

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Ok(srs) = dataset.spatial_ref() {
        if let Ok(code) = srs.auth_code() {
            raster.set_crs(Some(CRS::from_epsg(code as u32)));
        } else if let Ok(wkt) = srs.to_wkt() {
            raster.set_crs(Some(CRS::from_wkt(wkt)));
        }
    }

    if let Some(nodata) = rasterband.no_data_value() {
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

/// Write a Raster to a single-band float32 GeoTIFF, no-data as NaN
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let band = raster.to_f32_masked();
    let mut stack = BandStack::new();
    stack.push("", band)?;
    write_bands(&stack, path.as_ref(), options.unwrap_or_default(), false)
}

/// Write a band stack to a multi-band float32 GeoTIFF with band descriptions
pub fn write_stack<P: AsRef<Path>>(
    stack: &BandStack,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()> {
    write_bands(stack, path.as_ref(), options.unwrap_or_default(), true)
}

fn write_bands(
    stack: &BandStack,
    path: &Path,
    opts: GeoTiffOptions,
    describe: bool,
) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (rows, cols) = stack.shape();

    let mut create_options = RasterCreationOptions::new();
    create_options.set_name_value("COMPRESS", &opts.compression)?;
    create_options.set_name_value("INTERLEAVE", "PIXEL")?;
    if opts.tile_size > 0 {
        create_options.set_name_value("TILED", "YES")?;
        create_options.set_name_value("BLOCKXSIZE", &opts.tile_size.to_string())?;
        create_options.set_name_value("BLOCKYSIZE", &opts.tile_size.to_string())?;
    }
    if opts.bigtiff {
        create_options.set_name_value("BIGTIFF", "YES")?;
    }

    let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
        path,
        cols,
        rows,
        stack.len(),
        &create_options,
    )?;

    if let Some(transform) = stack.transform() {
        dataset.set_geo_transform(&transform.to_gdal())?;
    }

    if let Some(crs) = stack.crs() {
        if let Some(epsg) = crs.epsg() {
            dataset.set_spatial_ref(&SpatialRef::from_epsg(epsg)?)?;
        } else if let Some(wkt) = crs.wkt() {
            dataset.set_spatial_ref(&SpatialRef::from_wkt(wkt)?)?;
        }
    }

    for (index, (label, raster)) in stack.iter().enumerate() {
        let mut band = dataset.rasterband(index + 1)?;
        band.set_no_data_value(Some(f64::NAN))?;
        if describe {
            band.set_description(label)?;
        }
        let mut buffer = Buffer::new((cols, rows), raster.data().iter().copied().collect());
        band.write((0, 0), (cols, rows), &mut buffer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stack_roundtrip() {
        let mut a: Raster<f32> = Raster::filled(20, 30, 0.25);
        a.set_transform(GeoTransform::new(300_000.0, 6_300_000.0, 10.0, -10.0));
        a.set_crs(Some(CRS::from_epsg(32756)));
        let mut b = a.like(0.75);
        b.set(3, 4, f32::NAN).unwrap();

        let mut stack = BandStack::new();
        stack.push("NDVI-Apr", a).unwrap();
        stack.push("NDVI-Aug", b).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.tif");
        write_stack(&stack, &path, None).unwrap();

        let loaded = read_stack(&path).unwrap();
        assert_eq!(loaded.labels(), stack.labels());
        assert_eq!(loaded.crs().unwrap().epsg(), Some(32756));
        assert!(loaded.band(1).unwrap().get(3, 4).unwrap().is_nan());
    }
}
