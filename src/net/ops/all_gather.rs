// In: src/net/ops/all_gather.rs

//! The all- variants: every rank, not just one root, ends up with the full
//! concatenated buffers, size matrix, and displacements.

use crate::ctx::SelatContext;
use crate::error::{SelatError, SelatResult};
use crate::net::ops::{
    check_uniform_num_buffers, displacements_per_buffer, receive_counts, total_buffer_sizes,
    u32s_from_le_bytes, u32s_to_le_bytes, TableGatherResult,
};
use crate::net::{Allocator, TableSerializer};
use arrow::buffer::MutableBuffer;

/// Gathers every rank's table fragment onto every rank.
///
/// Size negotiation is an all-to-all exchange (every rank learns every
/// rank's sizes), and each logical buffer moves with one variable-size
/// all-gather, so the returned result set has identical contents on all
/// ranks.
///
/// Collective: every rank must call this with the same buffer count, in the
/// same position of its collective-call sequence.
pub fn all_gather_table(
    ctx: &SelatContext,
    serializer: &dyn TableSerializer,
    allocator: &dyn Allocator,
) -> SelatResult<TableGatherResult> {
    let comm = ctx.communicator();
    let world = comm.world_size() as usize;

    // first negotiate table buffer sizes
    let local_sizes = serializer.buffer_sizes();
    let num_buffers = local_sizes.len();

    let data_buffers = serializer.data_buffers();
    if data_buffers.len() != num_buffers {
        return Err(SelatError::Invalid(format!(
            "serializer reported {} sizes but {} data buffers",
            num_buffers,
            data_buffers.len()
        )));
    }
    for (i, (buf, &size)) in data_buffers.iter().zip(local_sizes.iter()).enumerate() {
        if buf.len() < size as usize {
            return Err(SelatError::Invalid(format!(
                "data buffer {} is {} bytes but its reported size is {}",
                i,
                buf.len(),
                size
            )));
        }
    }

    check_uniform_num_buffers(comm, num_buffers)?;

    let send = u32s_to_le_bytes(&local_sizes);
    let mut sizes_bytes = vec![0u8; 4 * world * num_buffers];
    comm.all_gather(&send, &mut sizes_bytes)?;
    let all_buffer_sizes = u32s_from_le_bytes(&sizes_bytes);

    let totals = total_buffer_sizes(&all_buffer_sizes, num_buffers, world);

    let mut result = TableGatherResult::default();
    for i in 0..num_buffers {
        let mut receive_buf = allocator.allocate(totals[i] as usize)?;
        let counts = receive_counts(&all_buffer_sizes, i, num_buffers, world);
        let displs = displacements_per_buffer(&all_buffer_sizes, i, num_buffers, world);
        comm.all_gather_v(
            &data_buffers[i][..local_sizes[i] as usize],
            receive_buf.as_bytes_mut(),
            &counts,
            &displs,
        )?;
        result.displacements.push(displs);
        result.received_buffers.push(receive_buf);
    }
    result.all_buffer_sizes = all_buffer_sizes;
    Ok(result)
}

/// All-gathers one contiguous auxiliary buffer, returning per-rank zero-copy
/// slices of the single concatenated destination on every rank.
pub fn all_gather_buffer(
    ctx: &SelatContext,
    buf: &arrow::buffer::Buffer,
) -> SelatResult<Vec<arrow::buffer::Buffer>> {
    let comm = ctx.communicator();
    let world = comm.world_size() as usize;

    let size = buf.len() as u32;
    let mut sizes_bytes = vec![0u8; 4 * world];
    comm.all_gather(&size.to_le_bytes(), &mut sizes_bytes)?;
    let all_sizes = u32s_from_le_bytes(&sizes_bytes);

    let total: usize = all_sizes.iter().map(|&s| s as usize).sum();
    let displs = displacements_per_buffer(&all_sizes, 0, 1, world);

    let mut dest = MutableBuffer::from_len_zeroed(total);
    comm.all_gather_v(buf.as_slice(), dest.as_slice_mut(), &all_sizes, &displs)?;

    let all_buf: arrow::buffer::Buffer = dest.into();
    Ok((0..world)
        .map(|w| all_buf.slice_with_length(displs[w] as usize, all_sizes[w] as usize))
        .collect())
}

//==================================================================================
// Unit Tests
//==================================================================================
