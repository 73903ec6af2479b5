//! Multi-period Sentinel-2 band stacking
//!
//! For every acquisition period the four 10 m spectral bands (B02, B03, B04,
//! B08) are located, loaded, clipped to the AOI, and extended with NDVI, EVI
//! and SAVI. Each period contributes seven bands labelled
//! `<band>-<period>` (`"B04-Apr"`, `"NDVI-Aug"`). Calendar months are
//! concatenated in calendar order whatever order they were given in, so
//! NDVI of the earliest month always sits at band 4.

mod locate;
mod period;

pub use locate::{locate_band, BandSource};
pub use period::Period;

use crate::clip::clip_raster;
use crate::imagery::{vegetation_indices, SpectralSet};
use greenstack_core::io::read_band_f32;
use greenstack_core::raster::{BandStack, Raster};
use greenstack_core::{Aoi, Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

/// Most periods a single stack may hold
pub const MAX_PERIODS: usize = 3;

/// Bands produced per period: four spectral bands and three indices
pub const BANDS_PER_PERIOD: usize = 7;

/// Sentinel-2 spectral bands used for stacking, in stack order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpectralBand {
    /// Blue, 490 nm
    B02,
    /// Green, 560 nm
    B03,
    /// Red, 665 nm
    B04,
    /// Near infrared, 842 nm
    B08,
}

impl SpectralBand {
    pub const ALL: [SpectralBand; 4] = [
        SpectralBand::B02,
        SpectralBand::B03,
        SpectralBand::B04,
        SpectralBand::B08,
    ];

    /// Band code as it appears in Sentinel-2 file names
    pub fn code(&self) -> &'static str {
        match self {
            SpectralBand::B02 => "B02",
            SpectralBand::B03 => "B03",
            SpectralBand::B04 => "B04",
            SpectralBand::B08 => "B08",
        }
    }
}

impl fmt::Display for SpectralBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What to do when a period has no file for a band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingBandPolicy {
    /// Record the miss and carry on
    #[default]
    Skip,
    /// Abort with [`Error::MissingBand`]
    Fail,
}

/// Parameters for stacking
#[derive(Debug, Clone)]
pub struct StackParams {
    pub policy: MissingBandPolicy,
    /// Accepted raster file extensions, without the dot
    pub extensions: Vec<String>,
}

impl Default for StackParams {
    fn default() -> Self {
        Self {
            policy: MissingBandPolicy::Skip,
            extensions: vec!["jp2".into(), "tif".into(), "tiff".into()],
        }
    }
}

/// One period's input
#[derive(Debug, Clone)]
pub struct PeriodInput {
    pub period: Period,
    pub source: BandSource,
}

impl PeriodInput {
    pub fn new(period: Period, source: BandSource) -> Self {
        Self { period, source }
    }
}

/// A band that had no matching file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingBand {
    /// Period key, empty in single-period mode
    pub period: String,
    pub band: SpectralBand,
}

/// Result of a stacking pass
#[derive(Debug, Clone)]
pub struct StackOutcome {
    pub stack: BandStack,
    /// Periods that contributed bands, in stack order
    pub periods: Vec<Period>,
    pub missing: Vec<MissingBand>,
}

/// Stack up to [`MAX_PERIODS`] periods into one labelled band stack.
///
/// Months are stacked in calendar order; periods without a month number
/// follow them in the order given. A period where no band file matches
/// contributes nothing, and under [`MissingBandPolicy::Skip`] neither does
/// a period whose directory does not exist. A period with some but not all
/// bands still contributes seven bands; the missing ones are all-NaN, as is
/// every index that depends on them.
///
/// # Errors
/// - [`Error::InvalidParameter`] for too many or duplicated periods
/// - [`Error::MissingBand`] under [`MissingBandPolicy::Fail`]
/// - [`Error::NoInput`] when no period yielded a single band
/// - clipping and I/O errors from any band
pub fn stack_periods(
    inputs: &[PeriodInput],
    aoi: &Aoi,
    params: &StackParams,
) -> Result<StackOutcome> {
    if inputs.is_empty() || inputs.len() > MAX_PERIODS {
        return Err(Error::InvalidParameter {
            name: "periods",
            value: inputs.len().to_string(),
            reason: format!("between 1 and {} periods are supported", MAX_PERIODS),
        });
    }
    let mut seen = HashSet::new();
    for input in inputs {
        if !seen.insert(input.period.key()) {
            return Err(Error::InvalidParameter {
                name: "periods",
                value: input.period.key().to_string(),
                reason: "period given more than once".into(),
            });
        }
    }

    let mut ordered: Vec<&PeriodInput> = inputs.iter().collect();
    ordered.sort_by_key(|input| input.period.month_number().unwrap_or(u8::MAX));

    let mut outcome = StackOutcome {
        stack: BandStack::new(),
        periods: Vec::new(),
        missing: Vec::new(),
    };

    for input in ordered {
        let period = &input.period;
        let bands = load_period(&input.source, aoi, params, period.key(), &mut outcome.missing)?;

        match assemble_period(bands, period.label())? {
            Some(block) => {
                info!(period = period.key(), bands = block.len(), "period stacked");
                outcome.stack.extend(block)?;
                outcome.periods.push(period.clone());
            }
            None => warn!(period = period.key(), "no band files matched, period skipped"),
        }
    }

    if outcome.stack.is_empty() {
        return Err(Error::NoInput(
            "no spectral band file matched in any period".into(),
        ));
    }
    Ok(outcome)
}

/// Stack a single scene. Labels are the bare band and index names
/// (`B02` .. `SAVI`).
pub fn stack_single(source: &BandSource, aoi: &Aoi, params: &StackParams) -> Result<StackOutcome> {
    let mut missing = Vec::new();
    let bands = load_period(source, aoi, params, "", &mut missing)?;

    let stack = assemble_period(bands, "")?.ok_or_else(|| {
        Error::NoInput("no spectral band file matched".into())
    })?;

    Ok(StackOutcome {
        stack,
        periods: Vec::new(),
        missing,
    })
}

/// Locate, load and clip the four spectral bands of one period
fn load_period(
    source: &BandSource,
    aoi: &Aoi,
    params: &StackParams,
    period: &str,
    missing: &mut Vec<MissingBand>,
) -> Result<[Option<Raster<f32>>; 4]> {
    let files = match source.files() {
        Ok(files) => files,
        Err(Error::NoInput(reason)) if params.policy == MissingBandPolicy::Skip => {
            warn!(period, %reason, "band source unavailable");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    let mut loaded: [Option<Raster<f32>>; 4] = Default::default();

    for (slot, band) in loaded.iter_mut().zip(SpectralBand::ALL) {
        let Some(path) = locate_band(band, &files, &params.extensions) else {
            if params.policy == MissingBandPolicy::Fail {
                return Err(Error::MissingBand {
                    band: band.code().to_string(),
                    period: period.to_string(),
                });
            }
            warn!(band = band.code(), period, "band file not found, skipping");
            missing.push(MissingBand {
                period: period.to_string(),
                band,
            });
            continue;
        };

        info!(band = band.code(), period, path = %path.display(), "loading band");
        let raster = read_band_f32(path)?;
        *slot = Some(clip_raster(&raster, aoi)?);
    }

    Ok(loaded)
}

/// Turn the loaded spectral bands of one period into its seven-band block.
///
/// Returns `None` when no band was loaded.
fn assemble_period(bands: [Option<Raster<f32>>; 4], period_label: &str) -> Result<Option<BandStack>> {
    let Some(template) = bands.iter().flatten().next() else {
        return Ok(None);
    };
    let mut filler = template.like(f32::NAN);
    filler.set_nodata(Some(f32::NAN));

    let [blue, green, red, nir] = bands.map(|b| b.unwrap_or_else(|| filler.clone()));
    let set = SpectralSet {
        blue,
        green,
        red,
        nir,
    };
    let indices = vegetation_indices(&set)?;

    let label = |name: &str| {
        if period_label.is_empty() {
            name.to_string()
        } else {
            format!("{}-{}", name, period_label)
        }
    };

    let mut block = BandStack::new();
    let SpectralSet {
        blue,
        green,
        red,
        nir,
    } = set;
    for (band, raster) in SpectralBand::ALL.iter().zip([blue, green, red, nir]) {
        block.push(label(band.code()), raster)?;
    }
    for (index, raster) in indices.into_labelled() {
        block.push(label(index.name()), raster)?;
    }

    Ok(Some(block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenstack_core::GeoTransform;

    fn band(value: f32) -> Raster<f32> {
        let mut r = Raster::filled(3, 3, value);
        r.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        r
    }

    #[test]
    fn test_full_period_block() {
        let bands = [Some(band(0.05)), Some(band(0.08)), Some(band(0.04)), Some(band(0.40))];
        let block = assemble_period(bands, "Apr").unwrap().unwrap();

        assert_eq!(block.len(), BANDS_PER_PERIOD);
        assert_eq!(
            block.labels(),
            ["B02-Apr", "B03-Apr", "B04-Apr", "B08-Apr", "NDVI-Apr", "EVI-Apr", "SAVI-Apr"]
        );
        let ndvi = block.band_by_label("NDVI-Apr").unwrap().get(1, 1).unwrap();
        assert!((ndvi - 0.36 / 0.44).abs() < 1e-6);
    }

    #[test]
    fn test_partial_period_keeps_positions() {
        // Blue missing: EVI is NaN, NDVI and SAVI are not
        let bands = [None, Some(band(0.08)), Some(band(0.04)), Some(band(0.40))];
        let block = assemble_period(bands, "").unwrap().unwrap();

        assert_eq!(block.len(), BANDS_PER_PERIOD);
        assert_eq!(block.labels()[0], "B02");
        assert!(block.band(0).unwrap().data().iter().all(|v| v.is_nan()));
        assert!(block.band_by_label("EVI").unwrap().get(0, 0).unwrap().is_nan());
        assert!(block.band_by_label("NDVI").unwrap().get(0, 0).unwrap().is_finite());
    }

    #[test]
    fn test_empty_period() {
        assert!(assemble_period([None, None, None, None], "Nov")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_period_count_and_duplicates() {
        let aoi = Aoi::new(vec![], greenstack_core::CRS::wgs84());
        let params = StackParams::default();
        let input = |m: &str| {
            PeriodInput::new(Period::month(m).unwrap(), BandSource::Files(vec![]))
        };

        let too_many = [input("apr"), input("may"), input("jun"), input("jul")];
        assert!(matches!(
            stack_periods(&too_many, &aoi, &params),
            Err(Error::InvalidParameter { name: "periods", .. })
        ));

        let dup = [input("april"), input("Apr")];
        assert!(matches!(
            stack_periods(&dup, &aoi, &params),
            Err(Error::InvalidParameter { name: "periods", .. })
        ));

        assert!(matches!(
            stack_periods(&[], &aoi, &params),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_unavailable_directory() {
        let aoi = Aoi::new(vec![], greenstack_core::CRS::wgs84());
        let inputs = [PeriodInput::new(
            Period::month("nov").unwrap(),
            BandSource::Directory("/definitely/not/here".into()),
        )];

        // Skipped like an empty period, so nothing is left to stack
        match stack_periods(&inputs, &aoi, &StackParams::default()) {
            Err(Error::NoInput(reason)) => assert!(reason.contains("any period")),
            other => panic!("expected NoInput, got {:?}", other.map(|o| o.stack.len())),
        }

        let strict = StackParams {
            policy: MissingBandPolicy::Fail,
            ..StackParams::default()
        };
        match stack_periods(&inputs, &aoi, &strict) {
            Err(Error::NoInput(reason)) => assert!(reason.contains("not a directory")),
            other => panic!("expected NoInput, got {:?}", other.map(|o| o.stack.len())),
        }
    }

    #[test]
    fn test_nothing_found_is_no_input() {
        let aoi = Aoi::new(vec![], greenstack_core::CRS::wgs84());
        let inputs = [PeriodInput::new(
            Period::month("aug").unwrap(),
            BandSource::Files(vec!["notes.txt".into()]),
        )];
        assert!(matches!(
            stack_periods(&inputs, &aoi, &StackParams::default()),
            Err(Error::NoInput(_))
        ));

        let strict = StackParams {
            policy: MissingBandPolicy::Fail,
            ..StackParams::default()
        };
        match stack_periods(&inputs, &aoi, &strict) {
            Err(Error::MissingBand { band, period }) => {
                assert_eq!(band, "B02");
                assert_eq!(period, "august");
            }
            other => panic!("expected MissingBand, got {:?}", other.map(|o| o.stack.len())),
        }
    }
}
