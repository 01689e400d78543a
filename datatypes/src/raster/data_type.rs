use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// The element type of a band
#[derive(
    Debug,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Hash,
    Deserialize,
    Serialize,
    Copy,
    Clone,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum RasterDataType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl RasterDataType {
    /// Returns true if the given `value` is valid for the `RasterDataType` variant,
    /// i.e. it can be represented by a variable of the corresponding primitive data type
    #[allow(clippy::float_cmp)]
    pub fn is_valid(self, value: f64) -> bool {
        match self {
            RasterDataType::F32 => value.is_nan() || self.cast(value) == value,
            RasterDataType::F64 => true,
            _ => self.cast(value) == value,
        }
    }

    /// Converts `value` to this type and back.
    ///
    /// Integer types saturate at their bounds, truncate toward zero and map NaN to zero.
    #[inline]
    pub fn cast(self, value: f64) -> f64 {
        match self {
            RasterDataType::U8 => round_trip::<u8>(value),
            RasterDataType::U16 => round_trip::<u16>(value),
            RasterDataType::U32 => round_trip::<u32>(value),
            RasterDataType::U64 => round_trip::<u64>(value),
            RasterDataType::I8 => round_trip::<i8>(value),
            RasterDataType::I16 => round_trip::<i16>(value),
            RasterDataType::I32 => round_trip::<i32>(value),
            RasterDataType::I64 => round_trip::<i64>(value),
            RasterDataType::F32 => round_trip::<f32>(value),
            RasterDataType::F64 => value,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, RasterDataType::F32 | RasterDataType::F64)
    }
}

#[inline]
fn round_trip<T>(value: f64) -> f64
where
    T: AsPrimitive<f64>,
    f64: AsPrimitive<T>,
{
    AsPrimitive::<T>::as_(value).as_()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    #[allow(clippy::float_cmp)]
    fn cast_saturates_and_truncates() {
        assert_eq!(RasterDataType::U8.cast(300.0), 255.0);
        assert_eq!(RasterDataType::U8.cast(-4.0), 0.0);
        assert_eq!(RasterDataType::I16.cast(-2.7), -2.0);
        assert_eq!(RasterDataType::I8.cast(f64::NAN), 0.0);
        assert_eq!(RasterDataType::U32.cast(f64::INFINITY), f64::from(u32::MAX));
        assert_eq!(RasterDataType::F32.cast(0.1), f64::from(0.1_f32));
        assert!(RasterDataType::F64.cast(f64::NAN).is_nan());
        assert!(RasterDataType::F32.cast(f64::NAN).is_nan());
    }

    #[test]
    fn validity() {
        assert!(RasterDataType::U8.is_valid(255.0));
        assert!(!RasterDataType::U8.is_valid(256.0));
        assert!(!RasterDataType::I32.is_valid(0.5));
        assert!(RasterDataType::F32.is_valid(f64::NAN));
        assert!(!RasterDataType::F32.is_valid(0.1));

        for data_type in RasterDataType::iter() {
            assert!(data_type.is_valid(0.0));
        }
    }

    #[test]
    fn names() {
        assert_eq!(RasterDataType::F32.to_string(), "F32");
        assert_eq!("U16".parse::<RasterDataType>().unwrap(), RasterDataType::U16);
        assert_eq!(
            serde_json::to_string(&RasterDataType::I64).unwrap(),
            "\"I64\""
        );
    }
}
