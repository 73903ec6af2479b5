//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate for TIFF I/O. Georeferencing is carried by the
//! GeoTIFF tags (pixel scale + tiepoint, or a model transformation) and the
//! GeoKey directory, which records the EPSG code when one is known.
//! Multi-band stacks are written pixel-interleaved as 32-bit float with a
//! `GDAL_METADATA` block naming each band, so GDAL-based tools see the
//! same labels.
//!
//! JPEG2000 and other non-TIFF formats need the `gdal` feature.

use super::metadata::{band_descriptions_xml, parse_band_descriptions};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BandStack, GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use flate2::write::ZlibEncoder;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_METADATA: u16 = 42112;
const TAG_GDAL_NODATA: u16 = 42113;
const TAG_EXTRA_SAMPLES: u16 = 338;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

const COMPRESSION_NONE: u16 = 1;
const COMPRESSION_DEFLATE: u16 = 8;

/// Extensions the native reader refuses with a pointer to the `gdal` feature
const GDAL_ONLY_EXTENSIONS: [&str; 4] = ["jp2", "j2k", "jpx", "vrt"];

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Strip compression: "NONE" or "DEFLATE"
    pub compression: String,
}

impl GeoTiffOptions {
    /// TIFF compression code for [`Self::compression`]
    fn compression_code(&self) -> Result<u16> {
        match self.compression.to_ascii_uppercase().as_str() {
            "NONE" => Ok(COMPRESSION_NONE),
            "DEFLATE" => Ok(COMPRESSION_DEFLATE),
            _ => Err(Error::InvalidParameter {
                name: "compression",
                value: self.compression.clone(),
                reason: "the native writer supports NONE and DEFLATE".into(),
            }),
        }
    }
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "NONE".to_string(),
        }
    }
}

/// Read one band of a GeoTIFF file into a Raster
///
/// `band` is 1-indexed and defaults to 1.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    check_native_format(path)?;
    let file = File::open(path)?;
    decode_band(BufReader::new(file), band)
}

/// Read one band of a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_band(Cursor::new(data), band)
}

/// Read every band of a GeoTIFF into a [`BandStack`].
///
/// Labels come from the `GDAL_METADATA` band descriptions, falling back to
/// `band_<n>`. No-data cells become NaN.
pub fn read_stack<P: AsRef<Path>>(path: P) -> Result<BandStack> {
    let path = path.as_ref();
    check_native_format(path)?;
    let file = File::open(path)?;
    decode_stack(BufReader::new(file))
}

/// Read every band of an in-memory GeoTIFF into a [`BandStack`]
pub fn read_stack_from_buffer(data: &[u8]) -> Result<BandStack> {
    decode_stack(Cursor::new(data))
}

/// Write a Raster to a single-band float32 GeoTIFF file
///
/// No-data cells are written as NaN and `GDAL_NODATA` is set to `nan`.
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let compression = options.unwrap_or_default().compression_code()?;
    let file = File::create(path.as_ref())?;
    encode_raster(raster, BufWriter::new(file), compression)
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let compression = options.unwrap_or_default().compression_code()?;
    let mut buf = Vec::new();
    encode_raster(raster, Cursor::new(&mut buf), compression)?;
    Ok(buf)
}

/// Write a band stack to a multi-band float32 GeoTIFF file
pub fn write_stack<P: AsRef<Path>>(
    stack: &BandStack,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()> {
    let compression = options.unwrap_or_default().compression_code()?;
    let file = File::create(path.as_ref())?;
    encode_stack(stack, BufWriter::new(file), compression)
}

/// Write a band stack to an in-memory multi-band GeoTIFF buffer
pub fn write_stack_to_buffer(stack: &BandStack, options: Option<GeoTiffOptions>) -> Result<Vec<u8>> {
    let compression = options.unwrap_or_default().compression_code()?;
    let mut buf = Vec::new();
    encode_stack(stack, Cursor::new(&mut buf), compression)?;
    Ok(buf)
}

fn check_native_format(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if GDAL_ONLY_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::UnsupportedFormat(format!(
            "{}: .{} files need the `gdal` feature",
            path.display(),
            ext
        )));
    }
    Ok(())
}

fn tiff_err(context: &'static str) -> impl Fn(tiff::TiffError) -> Error {
    move |e| Error::DataFormat(format!("{}: {}", context, e))
}

// ── Decoding ─────────────────────────────────────────────────────────────

/// Georeferencing recovered from GeoTIFF / GDAL tags
#[derive(Debug, Default)]
struct GeoMeta {
    transform: Option<GeoTransform>,
    crs: Option<CRS>,
    nodata: Option<f64>,
    metadata_xml: Option<String>,
}

/// A decoded image: interleaved samples plus georeferencing
struct DecodedImage {
    data: DecodingResult,
    rows: usize,
    cols: usize,
    samples: usize,
    meta: GeoMeta,
}

fn decode_image<R: Read + Seek>(reader: R) -> Result<DecodedImage> {
    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err("TIFF decode error"))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;

    let meta = read_geo_meta(&mut decoder);

    let data = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    let pixels = rows * cols;
    let len = decoded_len(&data)?;
    if pixels == 0 || len % pixels != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    Ok(DecodedImage {
        data,
        rows,
        cols,
        samples: len / pixels,
        meta,
    })
}

fn decode_band<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let image = decode_image(reader)?;
    let band = band.unwrap_or(1);
    if band == 0 || band > image.samples {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("file has {} band(s)", image.samples),
        });
    }

    let data = extract_sample::<T>(&image.data, image.samples, band - 1)?;
    let mut raster = Raster::from_vec(data, image.rows, image.cols)?;
    apply_meta(&mut raster, &image.meta);
    raster.set_nodata(image.meta.nodata.and_then(num_traits::cast));
    Ok(raster)
}

fn decode_stack<R: Read + Seek>(reader: R) -> Result<BandStack> {
    let image = decode_image(reader)?;

    let descriptions = match &image.meta.metadata_xml {
        Some(xml) => parse_band_descriptions(xml, image.samples)?,
        None => vec![None; image.samples],
    };
    let nodata: Option<f32> = image.meta.nodata.and_then(num_traits::cast);

    let mut stack = BandStack::new();
    for (index, description) in descriptions.into_iter().enumerate() {
        let data = extract_sample::<f32>(&image.data, image.samples, index)?;
        let mut band = Raster::from_vec(data, image.rows, image.cols)?;
        apply_meta(&mut band, &image.meta);
        band.set_nodata(nodata);
        let label = description.unwrap_or_else(|| format!("band_{}", index + 1));
        stack.push(label, band.to_f32_masked())?;
    }

    Ok(stack)
}

fn apply_meta<T: RasterElement>(raster: &mut Raster<T>, meta: &GeoMeta) {
    if let Some(transform) = meta.transform {
        raster.set_transform(transform);
    }
    raster.set_crs(meta.crs.clone());
}

fn decoded_len(data: &DecodingResult) -> Result<usize> {
    Ok(match data {
        DecodingResult::U8(b) => b.len(),
        DecodingResult::U16(b) => b.len(),
        DecodingResult::U32(b) => b.len(),
        DecodingResult::U64(b) => b.len(),
        DecodingResult::I8(b) => b.len(),
        DecodingResult::I16(b) => b.len(),
        DecodingResult::I32(b) => b.len(),
        DecodingResult::I64(b) => b.len(),
        DecodingResult::F32(b) => b.len(),
        DecodingResult::F64(b) => b.len(),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    })
}

/// Pull sample `index` out of pixel-interleaved data, casting to `T`
fn extract_sample<T: RasterElement>(
    data: &DecodingResult,
    samples: usize,
    index: usize,
) -> Result<Vec<T>> {
    fn pick<S: Copy + num_traits::NumCast, T: RasterElement>(
        buf: &[S],
        samples: usize,
        index: usize,
    ) -> Vec<T> {
        buf.iter()
            .skip(index)
            .step_by(samples)
            .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
            .collect()
    }

    Ok(match data {
        DecodingResult::U8(b) => pick(b, samples, index),
        DecodingResult::U16(b) => pick(b, samples, index),
        DecodingResult::U32(b) => pick(b, samples, index),
        DecodingResult::U64(b) => pick(b, samples, index),
        DecodingResult::I8(b) => pick(b, samples, index),
        DecodingResult::I16(b) => pick(b, samples, index),
        DecodingResult::I32(b) => pick(b, samples, index),
        DecodingResult::I64(b) => pick(b, samples, index),
        DecodingResult::F32(b) => pick(b, samples, index),
        DecodingResult::F64(b) => pick(b, samples, index),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    })
}

fn read_geo_meta<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoMeta {
    GeoMeta {
        transform: read_geotransform(decoder).ok(),
        crs: decoder
            .get_tag_u16_vec(tag(TAG_GEO_KEY_DIRECTORY))
            .ok()
            .and_then(|keys| crs_from_geokeys(&keys)),
        nodata: decoder
            .get_tag_ascii_string(tag(TAG_GDAL_NODATA))
            .ok()
            .and_then(|s| parse_nodata(&s)),
        metadata_xml: decoder.get_tag_ascii_string(tag(TAG_GDAL_METADATA)).ok(),
    }
}

/// Read the GeoTransform from ModelPixelScale + ModelTiepoint, or from
/// ModelTransformation when those are absent
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(TAG_MODEL_PIXEL_SCALE));
    let tiepoint = decoder.get_tag_f64_vec(tag(TAG_MODEL_TIEPOINT));

    if let (Ok(scale), Ok(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            // scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    let matrix = decoder
        .get_tag_f64_vec(tag(TAG_MODEL_TRANSFORMATION))
        .map_err(|_| Error::DataFormat("No georeferencing tags".into()))?;
    if matrix.len() >= 8 {
        return Ok(GeoTransform::from_gdal([
            matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5],
        ]));
    }

    Err(Error::DataFormat("Cannot determine geotransform".into()))
}

/// Resolve an EPSG-coded CRS from a GeoKeyDirectory
fn crs_from_geokeys(keys: &[u16]) -> Option<CRS> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;

    let mut model_type = None;
    let mut geographic = None;
    let mut projected = None;

    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // Only values stored inline in the directory carry codes we use
        if location != 0 {
            continue;
        }
        match key {
            KEY_MODEL_TYPE => model_type = Some(value),
            KEY_GEOGRAPHIC_TYPE if value != USER_DEFINED => geographic = Some(value),
            KEY_PROJECTED_CS_TYPE if value != USER_DEFINED => projected = Some(value),
            _ => {}
        }
    }

    let code = match model_type {
        Some(MODEL_TYPE_GEOGRAPHIC) => geographic.or(projected),
        _ => projected.or(geographic),
    }?;
    Some(CRS::from_epsg(code as u32))
}

fn parse_nodata(text: &str) -> Option<f64> {
    let trimmed = text.trim().trim_end_matches('\0');
    if trimmed.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    trimmed.parse().ok()
}

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

// ── Encoding ─────────────────────────────────────────────────────────────

fn encode_raster<T, W>(raster: &Raster<T>, writer: W, compression: u16) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let band = raster.to_f32_masked();
    let data: Vec<f32> = band.data().iter().copied().collect();
    let (rows, cols) = band.shape();
    encode_interleaved(
        writer,
        &data,
        rows,
        cols,
        1,
        band.transform(),
        band.crs(),
        None,
        compression,
    )
}

fn encode_stack<W: Write + Seek>(stack: &BandStack, writer: W, compression: u16) -> Result<()> {
    if stack.is_empty() {
        return Err(Error::NoInput("cannot write an empty band stack".into()));
    }

    let (rows, cols) = stack.shape();
    let samples = stack.len();
    let bands = stack.bands();

    let mut data = Vec::with_capacity(rows * cols * samples);
    for row in 0..rows {
        for col in 0..cols {
            for band in bands {
                data.push(band.data()[(row, col)]);
            }
        }
    }

    let default_transform = GeoTransform::default();
    encode_interleaved(
        writer,
        &data,
        rows,
        cols,
        samples,
        stack.transform().unwrap_or(&default_transform),
        stack.crs(),
        Some(stack.labels()),
        compression,
    )
}

#[allow(clippy::too_many_arguments)]
fn encode_interleaved<W: Write + Seek>(
    writer: W,
    data: &[f32],
    rows: usize,
    cols: usize,
    samples: usize,
    transform: &GeoTransform,
    crs: Option<&CRS>,
    labels: Option<&[String]>,
    compression: u16,
) -> Result<()> {
    let too_large = || Error::Other("raster too large for a classic TIFF".into());
    let samples_u16 = u16::try_from(samples).map_err(|_| too_large())?;

    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let mut dir = encoder
        .new_directory()
        .map_err(tiff_err("Cannot create TIFF directory"))?;

    // One strip holding the whole image
    let (offset, byte_count) = if compression == COMPRESSION_DEFLATE {
        let compressed = deflate_strip(data)?;
        let offset = dir
            .write_data(compressed.as_slice())
            .map_err(tiff_err("Cannot write image data"))?;
        (offset, compressed.len())
    } else {
        let offset = dir
            .write_data(data)
            .map_err(tiff_err("Cannot write image data"))?;
        (offset, data.len() * 4)
    };
    let offset = u32::try_from(offset).map_err(|_| too_large())?;
    let byte_count = u32::try_from(byte_count).map_err(|_| too_large())?;

    let write_err = tiff_err("Cannot write TIFF tag");
    let bits = vec![32u16; samples];
    let formats = vec![3u16; samples]; // IEEE floating point

    dir.write_tag(Tag::ImageWidth, cols as u32).map_err(&write_err)?;
    dir.write_tag(Tag::ImageLength, rows as u32).map_err(&write_err)?;
    dir.write_tag(Tag::BitsPerSample, bits.as_slice()).map_err(&write_err)?;
    dir.write_tag(Tag::SampleFormat, formats.as_slice()).map_err(&write_err)?;
    dir.write_tag(Tag::SamplesPerPixel, samples_u16).map_err(&write_err)?;
    dir.write_tag(Tag::PhotometricInterpretation, 1u16).map_err(&write_err)?; // BlackIsZero
    dir.write_tag(Tag::PlanarConfiguration, 1u16).map_err(&write_err)?; // chunky
    dir.write_tag(Tag::Compression, compression).map_err(&write_err)?;
    dir.write_tag(Tag::RowsPerStrip, rows as u32).map_err(&write_err)?;
    dir.write_tag(Tag::StripOffsets, offset).map_err(&write_err)?;
    dir.write_tag(Tag::StripByteCounts, byte_count).map_err(&write_err)?;
    if samples > 1 {
        let extra = vec![0u16; samples - 1]; // unspecified
        dir.write_tag(tag(TAG_EXTRA_SAMPLES), extra.as_slice()).map_err(&write_err)?;
    }

    if transform.is_north_up() {
        let scale = [transform.pixel_width, transform.pixel_height.abs(), 0.0];
        let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
        dir.write_tag(tag(TAG_MODEL_PIXEL_SCALE), &scale[..]).map_err(&write_err)?;
        dir.write_tag(tag(TAG_MODEL_TIEPOINT), &tiepoint[..]).map_err(&write_err)?;
    } else {
        let gt = transform.to_gdal();
        let matrix = [
            gt[1], gt[2], 0.0, gt[0], //
            gt[4], gt[5], 0.0, gt[3], //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(tag(TAG_MODEL_TRANSFORMATION), &matrix[..])
            .map_err(&write_err)?;
    }

    let geokeys = geokeys_for(crs);
    dir.write_tag(tag(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(&write_err)?;

    dir.write_tag(tag(TAG_GDAL_NODATA), "nan").map_err(&write_err)?;

    if let Some(labels) = labels {
        let xml = band_descriptions_xml(labels);
        dir.write_tag(tag(TAG_GDAL_METADATA), xml.as_str())
            .map_err(&write_err)?;
    }

    dir.finish().map_err(tiff_err("Cannot finish TIFF directory"))?;
    Ok(())
}

/// Zlib stream of the samples in native byte order, as the encoder writes
/// uncompressed strips
fn deflate_strip(data: &[f32]) -> Result<Vec<u8>> {
    let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&bytes)?;
    Ok(encoder.finish()?)
}

/// Build a GeoKeyDirectory. The EPSG code is recorded when it fits a GeoKey.
fn geokeys_for(crs: Option<&CRS>) -> Vec<u16> {
    let mut entries: Vec<[u16; 4]> = Vec::new();

    let epsg = crs
        .and_then(CRS::epsg)
        .and_then(|code| u16::try_from(code).ok());

    match (crs, epsg) {
        (Some(crs), Some(code)) if crs.is_geographic() => {
            entries.push([KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
            entries.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            entries.push([KEY_GEOGRAPHIC_TYPE, 0, 1, code]);
        }
        (_, Some(code)) => {
            entries.push([KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED]);
            entries.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            entries.push([KEY_PROJECTED_CS_TYPE, 0, 1, code]);
        }
        _ => {
            entries.push([KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED]);
            entries.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
        }
    }

    // Version 1.1.0, then the key count
    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn utm_band(rows: usize, cols: usize, base: f32) -> Raster<f32> {
        let data = (0..rows * cols).map(|i| base + i as f32).collect();
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(334_000.0, 6_252_000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32756)));
        r
    }

    #[test]
    fn test_single_band_roundtrip() {
        let mut raster = utm_band(5, 7, 100.0);
        raster.set(2, 3, f32::NAN).unwrap();

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let loaded: Raster<f32> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(loaded.shape(), (5, 7));
        assert_eq!(loaded.get(4, 6).unwrap(), 134.0);
        assert!(loaded.get(2, 3).unwrap().is_nan());
        assert!(loaded.nodata().unwrap().is_nan());
        assert_eq!(loaded.crs().unwrap().epsg(), Some(32756));
        assert_relative_eq!(loaded.transform().origin_x, 334_000.0);
        assert_relative_eq!(loaded.transform().pixel_height, -10.0);
    }

    #[test]
    fn test_stack_roundtrip_keeps_labels() {
        let mut stack = BandStack::new();
        stack.push("B04-Apr", utm_band(4, 3, 0.0)).unwrap();
        stack.push("B08-Apr", utm_band(4, 3, 50.0)).unwrap();
        stack.push("NDVI-Apr", utm_band(4, 3, -1.0)).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.tif");
        write_stack(&stack, &path, None).unwrap();

        let loaded = read_stack(&path).unwrap();
        assert_eq!(loaded.labels(), stack.labels());
        assert_eq!(loaded.shape(), (4, 3));
        assert_eq!(loaded.crs().unwrap().epsg(), Some(32756));
        assert!(loaded
            .transform()
            .unwrap()
            .approx_eq(stack.transform().unwrap(), 1e-9));
        for (a, b) in loaded.bands().iter().zip(stack.bands()) {
            assert_eq!(a.data(), b.data());
        }

        // Single-band readers see individual samples of the stack
        let nir: Raster<f32> = read_geotiff(&path, Some(2)).unwrap();
        assert_eq!(nir.get(0, 0).unwrap(), 50.0);
        assert!(read_geotiff::<f32, _>(&path, Some(4)).is_err());
    }

    #[test]
    fn test_deflate_strips() {
        let mut stack = BandStack::new();
        stack.push("B04", utm_band(30, 20, 0.0)).unwrap();
        stack.push("B08", utm_band(30, 20, 0.0)).unwrap();
        let deflate = GeoTiffOptions {
            compression: "deflate".into(),
        };

        let plain = write_stack_to_buffer(&stack, None).unwrap();
        let packed = write_stack_to_buffer(&stack, Some(deflate)).unwrap();
        assert!(packed.len() < plain.len());

        let loaded = read_stack_from_buffer(&packed).unwrap();
        assert_eq!(loaded.labels(), stack.labels());
        assert_eq!(loaded.band(1).unwrap().data(), stack.band(1).unwrap().data());
        assert_eq!(loaded.crs().unwrap().epsg(), Some(32756));
    }

    #[test]
    fn test_unknown_compression_is_rejected() {
        let lzw = GeoTiffOptions {
            compression: "LZW".into(),
        };
        assert!(matches!(
            write_geotiff_to_buffer(&utm_band(2, 2, 0.0), Some(lzw)),
            Err(Error::InvalidParameter { name: "compression", .. })
        ));
    }

    #[test]
    fn test_geographic_crs_roundtrip() {
        let mut raster: Raster<f32> = Raster::filled(2, 2, 1.0);
        raster.set_transform(GeoTransform::new(151.2, -33.8, 0.0001, -0.0001));
        raster.set_crs(Some(CRS::wgs84()));

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let loaded: Raster<f32> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert!(loaded.crs().unwrap().is_wgs84());
    }

    #[test]
    fn test_unlabelled_bands_get_default_names() {
        let raster = utm_band(2, 2, 1.0);
        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let stack = read_stack_from_buffer(&buf).unwrap();
        assert_eq!(stack.labels(), ["band_1"]);
    }

    #[test]
    fn test_jp2_requires_gdal() {
        let err = read_geotiff::<f32, _>("T56HLH_20240415_B04_10m.jp2", None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_geokeys_parse() {
        let keys = geokeys_for(Some(&CRS::from_epsg(32630)));
        assert_eq!(crs_from_geokeys(&keys).unwrap().epsg(), Some(32630));
        assert!(crs_from_geokeys(&geokeys_for(None)).is_none());
    }
}
