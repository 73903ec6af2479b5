//! ESA WorldCover land-cover summary
//!
//! Tallies the classes of a WorldCover raster (already clipped to an AOI)
//! and the share of green classes: tree cover, shrubland, grassland and
//! mangroves.

use greenstack_core::raster::Raster;
use serde::Serialize;
use std::collections::BTreeMap;

/// ESA WorldCover classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LandCoverClass {
    TreeCover,
    Shrubland,
    Grassland,
    Cropland,
    BuiltUp,
    BareSparse,
    SnowIce,
    Water,
    HerbaceousWetland,
    Mangroves,
    MossLichen,
}

impl LandCoverClass {
    pub const ALL: [LandCoverClass; 11] = [
        LandCoverClass::TreeCover,
        LandCoverClass::Shrubland,
        LandCoverClass::Grassland,
        LandCoverClass::Cropland,
        LandCoverClass::BuiltUp,
        LandCoverClass::BareSparse,
        LandCoverClass::SnowIce,
        LandCoverClass::Water,
        LandCoverClass::HerbaceousWetland,
        LandCoverClass::Mangroves,
        LandCoverClass::MossLichen,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn code(&self) -> i32 {
        match self {
            LandCoverClass::TreeCover => 10,
            LandCoverClass::Shrubland => 20,
            LandCoverClass::Grassland => 30,
            LandCoverClass::Cropland => 40,
            LandCoverClass::BuiltUp => 50,
            LandCoverClass::BareSparse => 60,
            LandCoverClass::SnowIce => 70,
            LandCoverClass::Water => 80,
            LandCoverClass::HerbaceousWetland => 90,
            LandCoverClass::Mangroves => 95,
            LandCoverClass::MossLichen => 100,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LandCoverClass::TreeCover => "Tree cover",
            LandCoverClass::Shrubland => "Shrubland",
            LandCoverClass::Grassland => "Grassland",
            LandCoverClass::Cropland => "Cropland",
            LandCoverClass::BuiltUp => "Built-up",
            LandCoverClass::BareSparse => "Bare/sparse vegetation",
            LandCoverClass::SnowIce => "Snow and ice",
            LandCoverClass::Water => "Permanent water bodies",
            LandCoverClass::HerbaceousWetland => "Herbaceous wetland",
            LandCoverClass::Mangroves => "Mangroves",
            LandCoverClass::MossLichen => "Moss and lichen",
        }
    }

    /// Counted as green space
    pub fn is_green(&self) -> bool {
        matches!(
            self,
            LandCoverClass::TreeCover
                | LandCoverClass::Shrubland
                | LandCoverClass::Grassland
                | LandCoverClass::Mangroves
        )
    }
}

/// Pixel count of one code present in the raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub code: i32,
    /// Class name, or `"Unknown (<code>)"`
    pub name: String,
    pub green: bool,
    pub pixels: usize,
    /// Share of all cells, nodata included
    pub percentage: f64,
}

/// Class distribution of a land-cover raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandCoverSummary {
    /// Present codes in ascending order
    pub classes: Vec<ClassCount>,
    /// Every cell of the raster
    pub total_pixels: usize,
    /// NaN cells
    pub nodata_pixels: usize,
    pub green_pixels: usize,
    pub green_percentage: f64,
    /// `total_pixels - green_pixels`
    pub non_green_pixels: usize,
    pub non_green_percentage: f64,
}

/// Tally the codes of `raster`.
///
/// Values are rounded to the nearest integer code. Percentages are shares of
/// all cells, so nodata lowers every class share.
pub fn summarize_landcover(raster: &Raster<f32>) -> LandCoverSummary {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    let mut nodata_pixels = 0;

    for &v in raster.data().iter() {
        if v.is_nan() {
            nodata_pixels += 1;
        } else {
            *counts.entry(v.round() as i32).or_default() += 1;
        }
    }

    let total_pixels = raster.len();
    let pct = |n: usize| {
        if total_pixels > 0 {
            n as f64 / total_pixels as f64 * 100.0
        } else {
            0.0
        }
    };

    let classes: Vec<ClassCount> = counts
        .into_iter()
        .map(|(code, pixels)| {
            let class = LandCoverClass::from_code(code);
            ClassCount {
                code,
                name: class.map_or_else(|| format!("Unknown ({})", code), |c| c.name().to_string()),
                green: class.map_or(false, |c| c.is_green()),
                pixels,
                percentage: pct(pixels),
            }
        })
        .collect();

    let green_pixels = classes.iter().filter(|c| c.green).map(|c| c.pixels).sum();
    let non_green_pixels = total_pixels - green_pixels;

    LandCoverSummary {
        classes,
        total_pixels,
        nodata_pixels,
        green_pixels,
        green_percentage: pct(green_pixels),
        non_green_pixels,
        non_green_percentage: pct(non_green_pixels),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_class_table() {
        assert_eq!(LandCoverClass::from_code(95), Some(LandCoverClass::Mangroves));
        assert_eq!(LandCoverClass::from_code(15), None);
        let green: Vec<i32> = LandCoverClass::ALL
            .iter()
            .filter(|c| c.is_green())
            .map(LandCoverClass::code)
            .collect();
        assert_eq!(green, vec![10, 20, 30, 95]);
    }

    #[test]
    fn test_summary() {
        let data = vec![
            50.0, 10.0, 10.0, 30.0, //
            80.0, 50.0, 7.0, f32::NAN,
        ];
        let raster = Raster::from_vec(data, 2, 4).unwrap();
        let s = summarize_landcover(&raster);

        assert_eq!(s.total_pixels, 8);
        assert_eq!(s.nodata_pixels, 1);
        let codes: Vec<i32> = s.classes.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![7, 10, 30, 50, 80]);

        assert_eq!(s.classes[0].name, "Unknown (7)");
        assert!(!s.classes[0].green);
        assert_eq!(s.classes[1].name, "Tree cover");
        assert_eq!(s.classes[1].pixels, 2);
        assert_relative_eq!(s.classes[1].percentage, 25.0);

        assert_eq!(s.green_pixels, 3);
        assert_relative_eq!(s.green_percentage, 37.5);
        assert_eq!(s.non_green_pixels, 5);
        assert_relative_eq!(s.non_green_percentage, 62.5);
    }

    #[test]
    fn test_all_nodata() {
        let raster = Raster::filled(2, 2, f32::NAN);
        let s = summarize_landcover(&raster);
        assert!(s.classes.is_empty());
        assert_eq!(s.nodata_pixels, 4);
        assert_eq!(s.green_pixels, 0);
        assert_relative_eq!(s.non_green_percentage, 100.0);
    }
}
