// In: src/table/mod.rs

//! Serializing an Arrow `RecordBatch` for the collective layer, and
//! rebuilding per-rank batches from a collective result set.
//!
//! A batch is exposed as exactly **three buffers per column**, in column
//! order: validity bitmap bytes (empty when the column has no nulls),
//! offsets bytes (empty for fixed-width columns), and value bytes. Empty
//! buffers still occupy their slot with size zero, so every rank reports the
//! same buffer count for a shared schema.
//!
//! After a gather, each rank's contribution is sliced back out of the
//! concatenated destinations via the displacement metadata and rebuilt as
//! one `RecordBatch` per rank. Offsets are only ever interpreted within one
//! rank's slice, so no offset rebasing is needed.

use crate::error::{SelatError, SelatResult};
use crate::net::ops::TableGatherResult;
use crate::net::TableSerializer;
use arrow::array::{make_array, ArrayData};
use arrow::buffer::Buffer;
use arrow::datatypes::{DataType, IntervalUnit, SchemaRef};
use arrow::record_batch::RecordBatch;

/// Buffers serialized per column: validity, offsets, values.
pub const BUFFERS_PER_COLUMN: usize = 3;

/// How a column's value bytes are laid out.
enum Layout {
    /// Fixed element width in bytes.
    Fixed(usize),
    /// Variable width with `i32` offsets (Utf8, Binary).
    Var32,
    /// Variable width with `i64` offsets (LargeUtf8, LargeBinary).
    Var64,
}

fn layout_of(data_type: &DataType) -> Option<Layout> {
    let fixed = |w| Some(Layout::Fixed(w));
    match data_type {
        DataType::Int8 | DataType::UInt8 => fixed(1),
        DataType::Int16 | DataType::UInt16 | DataType::Float16 => fixed(2),
        DataType::Int32 | DataType::UInt32 | DataType::Float32 | DataType::Date32 => fixed(4),
        DataType::Time32(_) => fixed(4),
        DataType::Int64 | DataType::UInt64 | DataType::Float64 | DataType::Date64 => fixed(8),
        DataType::Time64(_) | DataType::Timestamp(_, _) | DataType::Duration(_) => fixed(8),
        DataType::Interval(IntervalUnit::YearMonth) => fixed(4),
        DataType::Interval(IntervalUnit::DayTime) => fixed(8),
        DataType::Interval(IntervalUnit::MonthDayNano) => fixed(16),
        DataType::Decimal128(_, _) => fixed(16),
        DataType::Decimal256(_, _) => fixed(32),
        DataType::FixedSizeBinary(w) => fixed(*w as usize),
        DataType::Utf8 | DataType::Binary => Some(Layout::Var32),
        DataType::LargeUtf8 | DataType::LargeBinary => Some(Layout::Var64),
        // Boolean values are bit-packed; their row count cannot be recovered
        // from a byte count, so they cannot ride this serializer. Nested and
        // union types carry child arrays this layer does not understand.
        _ => None,
    }
}

/// A [`TableSerializer`] over one Arrow `RecordBatch`.
#[derive(Debug)]
pub struct BatchSerializer {
    columns: Vec<ArrayData>,
    sizes: Vec<u32>,
}

impl BatchSerializer {
    /// Validates the batch and captures its buffers.
    ///
    /// Sliced arrays (non-zero offset) and unsupported column types are
    /// rejected; callers should compact a sliced batch first.
    pub fn try_new(batch: &RecordBatch) -> SelatResult<Self> {
        let mut columns = Vec::with_capacity(batch.num_columns());
        let mut sizes = Vec::with_capacity(batch.num_columns() * BUFFERS_PER_COLUMN);

        for (i, column) in batch.columns().iter().enumerate() {
            let data = column.to_data();
            if data.offset() != 0 {
                return Err(SelatError::Invalid(format!(
                    "column {} is a sliced array; compact the batch before serializing",
                    i
                )));
            }
            let layout = layout_of(data.data_type()).ok_or_else(|| {
                SelatError::Invalid(format!(
                    "column {} has type {} which cannot be serialized for data movement",
                    i,
                    data.data_type()
                ))
            })?;

            let validity_size = match data.nulls() {
                Some(_) => data.len().div_ceil(8),
                None => 0,
            };
            let (offsets_size, values_size) = match layout {
                Layout::Fixed(_) => (0, data.buffers()[0].len()),
                Layout::Var32 | Layout::Var64 => {
                    (data.buffers()[0].len(), data.buffers()[1].len())
                }
            };

            sizes.push(validity_size as u32);
            sizes.push(offsets_size as u32);
            sizes.push(values_size as u32);
            columns.push(data);
        }

        Ok(Self { columns, sizes })
    }

    pub fn num_buffers(&self) -> usize {
        self.sizes.len()
    }
}

impl TableSerializer for BatchSerializer {
    fn buffer_sizes(&self) -> Vec<u32> {
        self.sizes.clone()
    }

    fn empty_buffer_sizes(&self) -> Vec<u32> {
        vec![0; self.sizes.len()]
    }

    fn data_buffers(&self) -> Vec<&[u8]> {
        let mut buffers = Vec::with_capacity(self.sizes.len());
        for (c, data) in self.columns.iter().enumerate() {
            let validity_size = self.sizes[c * BUFFERS_PER_COLUMN] as usize;
            match data.nulls() {
                Some(nulls) if validity_size > 0 => {
                    buffers.push(&nulls.buffer().as_slice()[..validity_size]);
                }
                _ => buffers.push(&[] as &[u8]),
            }
            match data.buffers().len() {
                0 => {
                    buffers.push(&[] as &[u8]);
                    buffers.push(&[] as &[u8]);
                }
                1 => {
                    buffers.push(&[] as &[u8]);
                    buffers.push(data.buffers()[0].as_slice());
                }
                _ => {
                    buffers.push(data.buffers()[0].as_slice());
                    buffers.push(data.buffers()[1].as_slice());
                }
            }
        }
        buffers
    }
}

/// Rebuilds one `RecordBatch` per rank from a table-collective result set.
///
/// `result` must come from a gather/all-gather whose every rank serialized a
/// batch of `schema` with [`BatchSerializer`]. On ranks where the result set
/// is unpopulated (non-root after a gather) the returned vector is empty.
pub fn rebuild_batches(
    schema: SchemaRef,
    result: &TableGatherResult,
    world_size: i32,
) -> SelatResult<Vec<RecordBatch>> {
    if result.all_buffer_sizes.is_empty() {
        return Ok(Vec::new());
    }
    let world = world_size as usize;
    let num_buffers = schema.fields().len() * BUFFERS_PER_COLUMN;
    if result.all_buffer_sizes.len() != world * num_buffers
        || result.received_buffers.len() != num_buffers
        || result.displacements.len() != num_buffers
    {
        return Err(SelatError::Invalid(format!(
            "result set does not describe {} ranks x {} buffers",
            world, num_buffers
        )));
    }

    let mut batches = Vec::with_capacity(world);
    for rank in 0..world {
        let mut arrays = Vec::with_capacity(schema.fields().len());
        for (c, field) in schema.fields().iter().enumerate() {
            let validity = rank_slice(result, num_buffers, c * BUFFERS_PER_COLUMN, rank);
            let offsets = rank_slice(result, num_buffers, c * BUFFERS_PER_COLUMN + 1, rank);
            let values = rank_slice(result, num_buffers, c * BUFFERS_PER_COLUMN + 2, rank);
            let array = rebuild_array(field.data_type(), validity, offsets, values)?;
            arrays.push(make_array(array));
        }
        batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
    }
    Ok(batches)
}

fn rank_slice<'a>(
    result: &'a TableGatherResult,
    num_buffers: usize,
    buffer_idx: usize,
    rank: usize,
) -> &'a [u8] {
    let offset = result.displacements[buffer_idx][rank] as usize;
    let length = result.all_buffer_sizes[rank * num_buffers + buffer_idx] as usize;
    &result.received_buffers[buffer_idx].as_bytes()[offset..offset + length]
}

fn rebuild_array(
    data_type: &DataType,
    validity: &[u8],
    offsets: &[u8],
    values: &[u8],
) -> SelatResult<ArrayData> {
    let layout = layout_of(data_type).ok_or_else(|| {
        SelatError::Invalid(format!(
            "column type {} cannot be rebuilt from received buffers",
            data_type
        ))
    })?;

    let (len, buffers) = match layout {
        Layout::Fixed(width) => {
            if width == 0 || values.len() % width != 0 {
                return Err(SelatError::ExecutionError(format!(
                    "received {} value bytes for {}, not a multiple of element width {}",
                    values.len(),
                    data_type,
                    width
                )));
            }
            (values.len() / width, vec![Buffer::from_slice_ref(values)])
        }
        Layout::Var32 => {
            let len = var_len(offsets, 4, data_type)?;
            let offsets_buf = if offsets.is_empty() {
                Buffer::from_slice_ref([0i32])
            } else {
                Buffer::from_slice_ref(offsets)
            };
            (len, vec![offsets_buf, Buffer::from_slice_ref(values)])
        }
        Layout::Var64 => {
            let len = var_len(offsets, 8, data_type)?;
            let offsets_buf = if offsets.is_empty() {
                Buffer::from_slice_ref([0i64])
            } else {
                Buffer::from_slice_ref(offsets)
            };
            (len, vec![offsets_buf, Buffer::from_slice_ref(values)])
        }
    };

    let null_bit_buffer = if validity.is_empty() {
        None
    } else {
        Some(Buffer::from_slice_ref(validity))
    };

    ArrayData::try_new(data_type.clone(), len, null_bit_buffer, 0, buffers, vec![])
        .map_err(SelatError::from)
}

/// Row count implied by a received offsets buffer.
fn var_len(offsets: &[u8], width: usize, data_type: &DataType) -> SelatResult<usize> {
    if offsets.is_empty() {
        return Ok(0);
    }
    if offsets.len() % width != 0 || offsets.len() < width {
        return Err(SelatError::ExecutionError(format!(
            "received {} offset bytes for {}, not a multiple of offset width {}",
            offsets.len(),
            data_type,
            width
        )));
    }
    Ok(offsets.len() / width - 1)
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, BooleanArray, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let ids = Int64Array::from(vec![Some(1), None, Some(3)]);
        let names = StringArray::from(vec![Some("a"), Some("bc"), None]);
        RecordBatch::try_new(schema, vec![Arc::new(ids), Arc::new(names)]).unwrap()
    }

    #[test]
    fn test_three_buffers_per_column() {
        let batch = sample_batch();
        let serializer = BatchSerializer::try_new(&batch).unwrap();
        assert_eq!(serializer.num_buffers(), 6);

        let sizes = serializer.buffer_sizes();
        let buffers = serializer.data_buffers();
        assert_eq!(sizes.len(), buffers.len());
        for (size, buf) in sizes.iter().zip(buffers.iter()) {
            assert_eq!(*size as usize, buf.len());
        }
        // id column: validity present, no offsets, 3 x 8 value bytes.
        assert_eq!(sizes[0], 1);
        assert_eq!(sizes[1], 0);
        assert_eq!(sizes[2], 24);
        // name column: validity present, 4 offsets, "abc" value bytes.
        assert_eq!(sizes[3], 1);
        assert_eq!(sizes[4], 16);
        assert_eq!(sizes[5], 3);
    }

    #[test]
    fn test_empty_sizes_match_shape() {
        let batch = sample_batch();
        let serializer = BatchSerializer::try_new(&batch).unwrap();
        let empty = serializer.empty_buffer_sizes();
        assert_eq!(empty.len(), serializer.num_buffers());
        assert!(empty.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_boolean_columns_are_rejected() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "flag",
            DataType::Boolean,
            false,
        )]));
        let flags = BooleanArray::from(vec![true, false]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(flags)]).unwrap();
        let err = BatchSerializer::try_new(&batch).unwrap_err();
        assert_eq!(err.code(), crate::error::Code::Invalid);
    }

    #[test]
    fn test_rebuild_array_roundtrip_without_collectives() {
        let batch = sample_batch();
        let serializer = BatchSerializer::try_new(&batch).unwrap();
        let buffers = serializer.data_buffers();

        let ids = rebuild_array(&DataType::Int64, buffers[0], buffers[1], buffers[2]).unwrap();
        let ids = make_array(ids);
        let ids = ids.as_any().downcast_ref::<Int64Array>().unwrap();
        let expected = Int64Array::from(vec![Some(1), None, Some(3)]);
        assert_eq!(ids, &expected);

        let names = rebuild_array(&DataType::Utf8, buffers[3], buffers[4], buffers[5]).unwrap();
        let names = make_array(names);
        let names = names.as_any().downcast_ref::<StringArray>().unwrap();
        let expected = StringArray::from(vec![Some("a"), Some("bc"), None]);
        assert_eq!(names, &expected);
    }

    #[test]
    fn test_rebuild_zero_length_contribution() {
        let utf8 = rebuild_array(&DataType::Utf8, &[], &[], &[]).unwrap();
        assert_eq!(utf8.len(), 0);
        let ints = rebuild_array(&DataType::Int64, &[], &[], &[]).unwrap();
        assert_eq!(ints.len(), 0);
    }

    #[test]
    fn test_unpopulated_result_set_rebuilds_to_nothing() {
        let schema = sample_batch().schema();
        let result = TableGatherResult::default();
        let batches = rebuild_batches(schema, &result, 4).unwrap();
        assert!(batches.is_empty());
    }
}
