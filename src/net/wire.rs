// In: src/net/wire.rs

//! The native wire mapping: which element encodings a backend moves, which
//! logical types and reduction operators map onto them, and the element-wise
//! reduction kernels the TCP backend folds with.
//!
//! The two lookups return `Option`; `None` is the "no native type / no native
//! operator" sentinel, and any collective entered with an unmapped type or
//! operator must fail `NotImplemented` before issuing a native call. This
//! guards against silently-wrong reductions on composite types.

use crate::error::{SelatError, SelatResult};
use crate::net::ReduceOp;
use crate::types::SelatDataType;
use num_traits::{Float, PrimInt, WrappingAdd, WrappingMul};

/// The closed set of element encodings a backend natively moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Bool,
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
    /// Opaque byte runs: the payload is moved as raw bytes, never
    /// reinterpreted.
    Bytes,
}

impl WireType {
    /// Element width in bytes.
    pub const fn size_bytes(self) -> usize {
        match self {
            WireType::Bool | WireType::UInt8 | WireType::Int8 | WireType::Bytes => 1,
            WireType::UInt16 | WireType::Int16 => 2,
            WireType::UInt32 | WireType::Int32 | WireType::Float32 => 4,
            WireType::UInt64 | WireType::Int64 | WireType::Float64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, WireType::Float32 | WireType::Float64)
    }
}

/// The closed set of native reduction operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireOp {
    Sum,
    Min,
    Max,
    Prod,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
}

/// Maps a logical data type onto the backend's native wire type.
///
/// Fixed-width numerics map to the equal-width native type; date/time types
/// map to the unsigned integer of matching width; string-like types map to
/// opaque bytes. Half floats, decimals, durations, intervals, and nested or
/// extension types are unmapped.
pub fn wire_type_of(data_type: &SelatDataType) -> Option<WireType> {
    match data_type {
        SelatDataType::Boolean => Some(WireType::Bool),
        SelatDataType::UInt8 => Some(WireType::UInt8),
        SelatDataType::Int8 => Some(WireType::Int8),
        SelatDataType::UInt16 => Some(WireType::UInt16),
        SelatDataType::Int16 => Some(WireType::Int16),
        SelatDataType::UInt32 => Some(WireType::UInt32),
        SelatDataType::Int32 => Some(WireType::Int32),
        SelatDataType::UInt64 => Some(WireType::UInt64),
        SelatDataType::Int64 => Some(WireType::Int64),
        SelatDataType::Float32 => Some(WireType::Float32),
        SelatDataType::Float64 => Some(WireType::Float64),
        SelatDataType::Date32 => Some(WireType::UInt32),
        SelatDataType::Date64 => Some(WireType::UInt64),
        SelatDataType::Timestamp => Some(WireType::UInt64),
        SelatDataType::Time32 => Some(WireType::UInt32),
        SelatDataType::Time64 => Some(WireType::UInt64),
        SelatDataType::Utf8
        | SelatDataType::LargeUtf8
        | SelatDataType::Binary
        | SelatDataType::LargeBinary
        | SelatDataType::FixedSizeBinary => Some(WireType::Bytes),
        // TODO: a 2-byte custom element type would let Float16 participate;
        // no backend needs it yet.
        SelatDataType::Float16
        | SelatDataType::Decimal
        | SelatDataType::Duration
        | SelatDataType::Interval
        | SelatDataType::List
        | SelatDataType::FixedSizeList
        | SelatDataType::Extension => None,
    }
}

/// Maps a logical reduction operator onto the backend's native operator.
///
/// The lookup is total over today's `ReduceOp`, but keeps the `Option` so the
/// "no operator" sentinel survives any future widening of the logical set.
pub fn wire_op_of(op: ReduceOp) -> Option<WireOp> {
    Some(match op {
        ReduceOp::Sum => WireOp::Sum,
        ReduceOp::Min => WireOp::Min,
        ReduceOp::Max => WireOp::Max,
        ReduceOp::Prod => WireOp::Prod,
        ReduceOp::LogicalAnd => WireOp::LogicalAnd,
        ReduceOp::LogicalOr => WireOp::LogicalOr,
        ReduceOp::BitwiseAnd => WireOp::BitAnd,
        ReduceOp::BitwiseOr => WireOp::BitOr,
    })
}

/// Whether the operator is defined over the wire type. Bitwise and logical
/// operators are not defined for floating-point elements; a native backend
/// rejects the combination at run time, and so do we.
pub fn op_defined_for(ty: WireType, op: WireOp) -> bool {
    !(ty.is_float()
        && matches!(
            op,
            WireOp::LogicalAnd | WireOp::LogicalOr | WireOp::BitAnd | WireOp::BitOr
        ))
}

//==================================================================================
// Reduction kernels
//==================================================================================

/// Folds `incoming` into `acc` element-wise: `acc[i] = op(acc[i], incoming[i])`.
///
/// Integer semantics are C-like (wrapping add/mul, logical ops producing 0/1);
/// float min/max follow IEEE `min`/`max`. `Bytes` and `Bool` participate as
/// unsigned bytes. Both slices must have the same length, a multiple of the
/// element width.
pub(crate) fn combine(
    acc: &mut [u8],
    incoming: &[u8],
    ty: WireType,
    op: WireOp,
) -> SelatResult<()> {
    if acc.len() != incoming.len() {
        return Err(SelatError::ExecutionError(format!(
            "reduction operand length mismatch: {} vs {} bytes",
            acc.len(),
            incoming.len()
        )));
    }
    match ty {
        WireType::Bool | WireType::UInt8 | WireType::Bytes => fold_int::<u8>(acc, incoming, op),
        WireType::Int8 => fold_int::<i8>(acc, incoming, op),
        WireType::UInt16 => fold_int::<u16>(acc, incoming, op),
        WireType::Int16 => fold_int::<i16>(acc, incoming, op),
        WireType::UInt32 => fold_int::<u32>(acc, incoming, op),
        WireType::Int32 => fold_int::<i32>(acc, incoming, op),
        WireType::UInt64 => fold_int::<u64>(acc, incoming, op),
        WireType::Int64 => fold_int::<i64>(acc, incoming, op),
        WireType::Float32 => fold_float::<f32>(acc, incoming, op),
        WireType::Float64 => fold_float::<f64>(acc, incoming, op),
    }
}

fn fold_int<T>(acc: &mut [u8], incoming: &[u8], op: WireOp) -> SelatResult<()>
where
    T: bytemuck::Pod + PrimInt + WrappingAdd + WrappingMul,
{
    let width = std::mem::size_of::<T>();
    for (a, b) in acc
        .chunks_exact_mut(width)
        .zip(incoming.chunks_exact(width))
    {
        // pod_read_unaligned: the caller's slices carry no alignment guarantee.
        let x: T = bytemuck::pod_read_unaligned(a);
        let y: T = bytemuck::pod_read_unaligned(b);
        let z = match op {
            WireOp::Sum => x.wrapping_add(&y),
            WireOp::Prod => x.wrapping_mul(&y),
            WireOp::Min => if y < x { y } else { x },
            WireOp::Max => if y > x { y } else { x },
            WireOp::LogicalAnd => {
                if !x.is_zero() && !y.is_zero() {
                    T::one()
                } else {
                    T::zero()
                }
            }
            WireOp::LogicalOr => {
                if !x.is_zero() || !y.is_zero() {
                    T::one()
                } else {
                    T::zero()
                }
            }
            WireOp::BitAnd => x & y,
            WireOp::BitOr => x | y,
        };
        a.copy_from_slice(bytemuck::bytes_of(&z));
    }
    Ok(())
}

fn fold_float<T>(acc: &mut [u8], incoming: &[u8], op: WireOp) -> SelatResult<()>
where
    T: bytemuck::Pod + Float,
{
    let width = std::mem::size_of::<T>();
    for (a, b) in acc
        .chunks_exact_mut(width)
        .zip(incoming.chunks_exact(width))
    {
        let x: T = bytemuck::pod_read_unaligned(a);
        let y: T = bytemuck::pod_read_unaligned(b);
        let z = match op {
            WireOp::Sum => x + y,
            WireOp::Prod => x * y,
            WireOp::Min => x.min(y),
            WireOp::Max => x.max(y),
            WireOp::LogicalAnd | WireOp::LogicalOr | WireOp::BitAnd | WireOp::BitOr => {
                return Err(SelatError::ExecutionError(format!(
                    "reduction operator {:?} is not defined for floating point elements",
                    op
                )));
            }
        };
        a.copy_from_slice(bytemuck::bytes_of(&z));
    }
    Ok(())
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_numerics_map_to_equal_width() {
        assert_eq!(
            wire_type_of(&SelatDataType::Int32),
            Some(WireType::Int32)
        );
        assert_eq!(
            wire_type_of(&SelatDataType::Float64),
            Some(WireType::Float64)
        );
        assert_eq!(wire_type_of(&SelatDataType::UInt8), Some(WireType::UInt8));
    }

    #[test]
    fn test_temporal_types_map_to_matching_width_unsigned() {
        assert_eq!(wire_type_of(&SelatDataType::Date32), Some(WireType::UInt32));
        assert_eq!(wire_type_of(&SelatDataType::Date64), Some(WireType::UInt64));
        assert_eq!(
            wire_type_of(&SelatDataType::Timestamp),
            Some(WireType::UInt64)
        );
        assert_eq!(wire_type_of(&SelatDataType::Time32), Some(WireType::UInt32));
        assert_eq!(wire_type_of(&SelatDataType::Time64), Some(WireType::UInt64));
    }

    #[test]
    fn test_string_like_types_map_to_bytes() {
        for dt in [
            SelatDataType::Utf8,
            SelatDataType::LargeBinary,
            SelatDataType::FixedSizeBinary,
        ] {
            assert_eq!(wire_type_of(&dt), Some(WireType::Bytes));
        }
    }

    #[test]
    fn test_composite_and_half_types_are_unmapped() {
        for dt in [
            SelatDataType::Float16,
            SelatDataType::Decimal,
            SelatDataType::Duration,
            SelatDataType::Interval,
            SelatDataType::List,
            SelatDataType::FixedSizeList,
            SelatDataType::Extension,
        ] {
            assert_eq!(wire_type_of(&dt), None, "{dt} must be unmapped");
        }
    }

    #[test]
    fn test_every_reduce_op_has_a_native_op() {
        for op in [
            ReduceOp::Sum,
            ReduceOp::Min,
            ReduceOp::Max,
            ReduceOp::Prod,
            ReduceOp::LogicalAnd,
            ReduceOp::LogicalOr,
            ReduceOp::BitwiseAnd,
            ReduceOp::BitwiseOr,
        ] {
            assert!(wire_op_of(op).is_some());
        }
    }

    #[test]
    fn test_combine_sum_wraps_like_c() {
        let mut acc = 250u8.to_le_bytes().to_vec();
        let rhs = 10u8.to_le_bytes().to_vec();
        combine(&mut acc, &rhs, WireType::UInt8, WireOp::Sum).unwrap();
        assert_eq!(acc[0], 4); // 260 mod 256
    }

    #[test]
    fn test_combine_min_max_signed() {
        let mut acc: Vec<u8> = [-5i32, 7].iter().flat_map(|v| v.to_le_bytes()).collect();
        let rhs: Vec<u8> = [3i32, -9].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut mins = acc.clone();
        combine(&mut mins, &rhs, WireType::Int32, WireOp::Min).unwrap();
        combine(&mut acc, &rhs, WireType::Int32, WireOp::Max).unwrap();
        assert_eq!(&mins[0..4], (-5i32).to_le_bytes());
        assert_eq!(&mins[4..8], (-9i32).to_le_bytes());
        assert_eq!(&acc[0..4], 3i32.to_le_bytes());
        assert_eq!(&acc[4..8], 7i32.to_le_bytes());
    }

    #[test]
    fn test_combine_logical_ops_produce_zero_or_one() {
        let mut acc = 42u64.to_le_bytes().to_vec();
        let rhs = 0u64.to_le_bytes().to_vec();
        combine(&mut acc, &rhs, WireType::UInt64, WireOp::LogicalAnd).unwrap();
        assert_eq!(acc, 0u64.to_le_bytes());
        let mut acc = 42u64.to_le_bytes().to_vec();
        combine(&mut acc, &rhs, WireType::UInt64, WireOp::LogicalOr).unwrap();
        assert_eq!(acc, 1u64.to_le_bytes());
    }

    #[test]
    fn test_combine_float_sum_and_bitwise_rejection() {
        let mut acc = 1.5f64.to_le_bytes().to_vec();
        let rhs = 2.25f64.to_le_bytes().to_vec();
        combine(&mut acc, &rhs, WireType::Float64, WireOp::Sum).unwrap();
        assert_eq!(acc, 3.75f64.to_le_bytes());
        assert!(combine(&mut acc, &rhs, WireType::Float64, WireOp::BitAnd).is_err());
        assert!(!op_defined_for(WireType::Float32, WireOp::BitOr));
        assert!(op_defined_for(WireType::Float32, WireOp::Sum));
    }
}
