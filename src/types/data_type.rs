//! This module defines the canonical, type-safe representation of logical data
//! types used throughout the selat engine.

use crate::error::SelatError;
use arrow::datatypes::{DataType as ArrowDataType, IntervalUnit, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical, internal representation of a logical data type.
///
/// This enum is deliberately parameter-free: a `Timestamp` is a `Timestamp`
/// regardless of unit or timezone, because the communication layer only needs
/// to know the element's logical identity and physical width. Parametric
/// detail stays with the Arrow schema the caller holds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelatDataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Date32,
    Date64,
    Timestamp,
    Time32,
    Time64,
    Duration,
    Interval,
    Decimal,
    Utf8,
    LargeUtf8,
    Binary,
    LargeBinary,
    FixedSizeBinary,
    List,
    FixedSizeList,
    Extension,
}

impl SelatDataType {
    /// Converts an Arrow `DataType` into a `SelatDataType`, dropping the
    /// parametric detail (units, timezones, precisions, child types).
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Result<Self, SelatError> {
        match arrow_type {
            ArrowDataType::Boolean => Ok(Self::Boolean),
            ArrowDataType::Int8 => Ok(Self::Int8),
            ArrowDataType::Int16 => Ok(Self::Int16),
            ArrowDataType::Int32 => Ok(Self::Int32),
            ArrowDataType::Int64 => Ok(Self::Int64),
            ArrowDataType::UInt8 => Ok(Self::UInt8),
            ArrowDataType::UInt16 => Ok(Self::UInt16),
            ArrowDataType::UInt32 => Ok(Self::UInt32),
            ArrowDataType::UInt64 => Ok(Self::UInt64),
            ArrowDataType::Float16 => Ok(Self::Float16),
            ArrowDataType::Float32 => Ok(Self::Float32),
            ArrowDataType::Float64 => Ok(Self::Float64),
            ArrowDataType::Date32 => Ok(Self::Date32),
            ArrowDataType::Date64 => Ok(Self::Date64),
            ArrowDataType::Timestamp(_, _) => Ok(Self::Timestamp),
            ArrowDataType::Time32(_) => Ok(Self::Time32),
            ArrowDataType::Time64(_) => Ok(Self::Time64),
            ArrowDataType::Duration(_) => Ok(Self::Duration),
            ArrowDataType::Interval(_) => Ok(Self::Interval),
            ArrowDataType::Decimal128(_, _) | ArrowDataType::Decimal256(_, _) => Ok(Self::Decimal),
            ArrowDataType::Utf8 => Ok(Self::Utf8),
            ArrowDataType::LargeUtf8 => Ok(Self::LargeUtf8),
            ArrowDataType::Binary => Ok(Self::Binary),
            ArrowDataType::LargeBinary => Ok(Self::LargeBinary),
            ArrowDataType::FixedSizeBinary(_) => Ok(Self::FixedSizeBinary),
            ArrowDataType::List(_) | ArrowDataType::LargeList(_) => Ok(Self::List),
            ArrowDataType::FixedSizeList(_, _) => Ok(Self::FixedSizeList),
            dt => Err(SelatError::Invalid(format!(
                "Cannot convert Arrow type {:?} to SelatDataType",
                dt
            ))),
        }
    }

    /// Converts a `SelatDataType` back into its canonical Arrow `DataType`.
    ///
    /// Parametric types (decimals, fixed-size binaries, nested and extension
    /// types) have no canonical Arrow form without their parameters; asking
    /// for one is an error. Time-carrying types get a fixed canonical unit.
    pub fn to_arrow_type(&self) -> Result<ArrowDataType, SelatError> {
        match self {
            Self::Boolean => Ok(ArrowDataType::Boolean),
            Self::Int8 => Ok(ArrowDataType::Int8),
            Self::Int16 => Ok(ArrowDataType::Int16),
            Self::Int32 => Ok(ArrowDataType::Int32),
            Self::Int64 => Ok(ArrowDataType::Int64),
            Self::UInt8 => Ok(ArrowDataType::UInt8),
            Self::UInt16 => Ok(ArrowDataType::UInt16),
            Self::UInt32 => Ok(ArrowDataType::UInt32),
            Self::UInt64 => Ok(ArrowDataType::UInt64),
            Self::Float16 => Ok(ArrowDataType::Float16),
            Self::Float32 => Ok(ArrowDataType::Float32),
            Self::Float64 => Ok(ArrowDataType::Float64),
            Self::Date32 => Ok(ArrowDataType::Date32),
            Self::Date64 => Ok(ArrowDataType::Date64),
            Self::Timestamp => Ok(ArrowDataType::Timestamp(TimeUnit::Microsecond, None)),
            Self::Time32 => Ok(ArrowDataType::Time32(TimeUnit::Millisecond)),
            Self::Time64 => Ok(ArrowDataType::Time64(TimeUnit::Microsecond)),
            Self::Duration => Ok(ArrowDataType::Duration(TimeUnit::Microsecond)),
            Self::Interval => Ok(ArrowDataType::Interval(IntervalUnit::MonthDayNano)),
            Self::Utf8 => Ok(ArrowDataType::Utf8),
            Self::LargeUtf8 => Ok(ArrowDataType::LargeUtf8),
            Self::Binary => Ok(ArrowDataType::Binary),
            Self::LargeBinary => Ok(ArrowDataType::LargeBinary),
            dt => Err(SelatError::Invalid(format!(
                "SelatDataType {:?} has no canonical Arrow form without its parameters",
                dt
            ))),
        }
    }

    /// Returns `true` if the data type is a signed integer.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns `true` if the data type is an unsigned integer.
    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Returns `true` if values of this type are moved as opaque byte runs
    /// rather than fixed-width elements.
    pub fn is_binary_like(&self) -> bool {
        matches!(
            self,
            Self::Utf8 | Self::LargeUtf8 | Self::Binary | Self::LargeBinary | Self::FixedSizeBinary
        )
    }
}

/// Provides the canonical string representation for a `SelatDataType`.
impl fmt::Display for SelatDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_roundtrip_for_numerics() {
        for dt in [
            SelatDataType::Int8,
            SelatDataType::UInt32,
            SelatDataType::Int64,
            SelatDataType::Float64,
        ] {
            let arrow = dt.to_arrow_type().unwrap();
            assert_eq!(SelatDataType::from_arrow_type(&arrow).unwrap(), dt);
        }
    }

    #[test]
    fn test_parametric_arrow_types_collapse_to_tags() {
        let ts = ArrowDataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()));
        assert_eq!(
            SelatDataType::from_arrow_type(&ts).unwrap(),
            SelatDataType::Timestamp
        );
        assert_eq!(
            SelatDataType::from_arrow_type(&ArrowDataType::FixedSizeBinary(16)).unwrap(),
            SelatDataType::FixedSizeBinary
        );
    }

    #[test]
    fn test_parametric_tags_have_no_canonical_arrow_form() {
        assert!(SelatDataType::Decimal.to_arrow_type().is_err());
        assert!(SelatDataType::List.to_arrow_type().is_err());
        assert!(SelatDataType::Extension.to_arrow_type().is_err());
    }
}
