//! Cell value trait for raster grids

use num_traits::{NumCast, Zero};
use std::fmt::{Debug, Display};

/// Types that can be stored in a raster cell.
///
/// Covers the integer and floating point pixel types a GeoTIFF band can
/// carry. Values are moved between types through `f64`.
pub trait RasterElement:
    Copy + Debug + Display + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Fallback no-data value when a cast from the file type fails
    fn default_nodata() -> Self;

    /// Whether this value is no-data given the raster sentinel
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
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
                    nodata == Some(*self)
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

                // The GeoTIFF reader rounds the sentinel to the stored sample
                // precision; the tolerance only absorbs arithmetic noise.
                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    if self.is_nan() {
                        return true;
                    }
                    match nodata {
                        Some(nd) if nd.is_nan() => false,
                        Some(nd) => (self - nd).abs() <= <$t>::EPSILON * 100.0 * nd.abs().max(1.0),
                        None => false,
                    }
                }

                fn is_float() -> bool {
                    true
                }
            }
        )*
    };
}

impl_raster_element_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_raster_element_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!((-32767.0f64).is_nodata(Some(-32767.0)));
        assert!(!(0.0f64).is_nodata(Some(-32767.0)));
        assert!(!(1.0f64).is_nodata(None));
    }

    #[test]
    fn test_int_nodata() {
        assert!(0u8.is_nodata(Some(0)));
        assert!(!1u8.is_nodata(Some(0)));
        assert!(!0i32.is_nodata(None));
    }
}
