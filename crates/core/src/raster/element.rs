//! Cell value trait for generic rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Sentinel-2 tiles arrive as `u16` reflectance; everything downstream of
/// loading is `f32` with NaN as the missing-value sentinel.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert to `f32`, mapping no-data (and unrepresentable values) to NaN
    fn to_f32_masked(self, nodata: Option<Self>) -> f32 {
        if self.is_nodata(nodata) {
            return f32::NAN;
        }
        NumCast::from(self).unwrap_or(f32::NAN)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::MIN
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    nodata.map_or(false, |nd| *self == nd)
                }

                fn is_float() -> bool {
                    false
                }
            }
        )*
    };
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::NAN
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    if self.is_nan() {
                        return true;
                    }
                    match nodata {
                        Some(nd) if !nd.is_nan() => (self - nd).abs() < <$t>::EPSILON * 100.0,
                        _ => false,
                    }
                }

                fn is_float() -> bool {
                    true
                }
            }
        )*
    };
}

impl_raster_element_int!(u8, u16, i16, u32, i32);
impl_raster_element_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_nodata_masks_to_nan() {
        assert!(0u16.to_f32_masked(Some(0)).is_nan());
        assert_eq!(1234u16.to_f32_masked(Some(0)), 1234.0);
        assert_eq!(0u16.to_f32_masked(None), 0.0);
    }

    #[test]
    fn float_nan_is_always_nodata() {
        assert!(f32::NAN.is_nodata(None));
        assert!(f32::NAN.is_nodata(Some(f32::NAN)));
        assert!(!0.5f32.is_nodata(Some(f32::NAN)));
        assert!((-9999.0f32).is_nodata(Some(-9999.0)));
    }
}
