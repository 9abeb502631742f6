// In: src/net/ops/gather.rs

//! Root-centric collection of a multi-buffer table fragment (and the
//! single-buffer specialization) into buffers owned by the root only.

use crate::ctx::SelatContext;
use crate::error::{SelatError, SelatResult};
use crate::net::ops::{
    check_uniform_num_buffers, displacements_per_buffer, receive_counts, total_buffer_sizes,
    u32s_from_le_bytes, u32s_to_le_bytes, TableGatherResult,
};
use crate::net::{Allocator, TableSerializer};
use arrow::buffer::MutableBuffer;

/// Gathers every rank's table fragment onto `gather_root`.
///
/// Each non-root rank (and the root too, when `gather_from_root` is set)
/// contributes its real per-buffer sizes; otherwise the root negotiates with
/// the all-zero vector, so it receives only the others' rows. On the root the
/// returned result set is fully populated; every other rank gets the empty
/// result set.
///
/// Collective: every rank must call this with the same root, flag, and
/// buffer count, in the same position of its collective-call sequence.
pub fn gather_table(
    ctx: &SelatContext,
    serializer: &dyn TableSerializer,
    gather_root: i32,
    gather_from_root: bool,
    allocator: &dyn Allocator,
) -> SelatResult<TableGatherResult> {
    let comm = ctx.communicator();
    let world = comm.world_size() as usize;
    let is_root = comm.rank() == gather_root;

    // first negotiate table buffer sizes
    let local_sizes = if is_root && !gather_from_root {
        serializer.empty_buffer_sizes()
    } else {
        serializer.buffer_sizes()
    };
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
    let mut sizes_bytes = vec![0u8; if is_root { 4 * world * num_buffers } else { 0 }];
    comm.gather(&send, gather_root, is_root.then_some(&mut sizes_bytes[..]))?;

    let mut result = TableGatherResult::default();
    if is_root {
        let all_buffer_sizes = u32s_from_le_bytes(&sizes_bytes);
        let totals = total_buffer_sizes(&all_buffer_sizes, num_buffers, world);
        for i in 0..num_buffers {
            let mut receive_buf = allocator.allocate(totals[i] as usize)?;
            let counts = receive_counts(&all_buffer_sizes, i, num_buffers, world);
            let displs = displacements_per_buffer(&all_buffer_sizes, i, num_buffers, world);
            comm.gather_v(
                &data_buffers[i][..local_sizes[i] as usize],
                gather_root,
                Some((receive_buf.as_bytes_mut(), &counts, &displs)),
            )?;
            result.displacements.push(displs);
            result.received_buffers.push(receive_buf);
        }
        result.all_buffer_sizes = all_buffer_sizes;
    } else {
        for i in 0..num_buffers {
            comm.gather_v(
                &data_buffers[i][..local_sizes[i] as usize],
                gather_root,
                None,
            )?;
        }
    }
    Ok(result)
}

/// Gathers one contiguous auxiliary buffer onto `gather_root`, returning
/// per-rank zero-copy slices of the single concatenated destination. Only the
/// root gets a non-empty vector.
pub fn gather_buffer(
    ctx: &SelatContext,
    buf: &arrow::buffer::Buffer,
    gather_root: i32,
) -> SelatResult<Vec<arrow::buffer::Buffer>> {
    let comm = ctx.communicator();
    let world = comm.world_size() as usize;
    let is_root = comm.rank() == gather_root;

    let size = buf.len() as u32;
    let mut sizes_bytes = vec![0u8; if is_root { 4 * world } else { 0 }];
    comm.gather(
        &size.to_le_bytes(),
        gather_root,
        is_root.then_some(&mut sizes_bytes[..]),
    )?;

    if !is_root {
        comm.gather_v(buf.as_slice(), gather_root, None)?;
        return Ok(Vec::new());
    }

    let all_sizes = u32s_from_le_bytes(&sizes_bytes);
    let total: usize = all_sizes.iter().map(|&s| s as usize).sum();
    let displs = displacements_per_buffer(&all_sizes, 0, 1, world);

    let mut dest = MutableBuffer::from_len_zeroed(total);
    comm.gather_v(
        buf.as_slice(),
        gather_root,
        Some((dest.as_slice_mut(), &all_sizes, &displs)),
    )?;

    let all_buf: arrow::buffer::Buffer = dest.into();
    Ok((0..world)
        .map(|w| all_buf.slice_with_length(displs[w] as usize, all_sizes[w] as usize))
        .collect())
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ctx::SelatContext;
    use crate::error::Code;
    use crate::net::{ArrowAllocator, LocalCommunicator};

    pub(crate) struct ByteColumns {
        pub bufs: Vec<Vec<u8>>,
    }

    impl TableSerializer for ByteColumns {
        fn buffer_sizes(&self) -> Vec<u32> {
            self.bufs.iter().map(|b| b.len() as u32).collect()
        }
        fn empty_buffer_sizes(&self) -> Vec<u32> {
            vec![0; self.bufs.len()]
        }
        fn data_buffers(&self) -> Vec<&[u8]> {
            self.bufs.iter().map(|b| b.as_slice()).collect()
        }
    }

    fn local_ctx() -> SelatContext {
        SelatContext::from_communicator(Box::new(LocalCommunicator::new()))
    }

    #[test]
    fn test_single_rank_gather_table() {
        let ctx = local_ctx();
        let serializer = ByteColumns {
            bufs: vec![vec![1, 2, 3], vec![], vec![9; 5]],
        };
        let result = gather_table(&ctx, &serializer, 0, true, &ArrowAllocator).unwrap();
        assert_eq!(result.all_buffer_sizes, vec![3, 0, 5]);
        assert_eq!(result.received_buffers.len(), 3);
        assert_eq!(result.received_buffers[0].as_bytes(), &[1, 2, 3]);
        assert!(result.received_buffers[1].is_empty());
        assert_eq!(result.displacements, vec![vec![0], vec![0], vec![0]]);
    }

    #[test]
    fn test_single_rank_gather_without_root_contribution() {
        let ctx = local_ctx();
        let serializer = ByteColumns {
            bufs: vec![vec![1, 2, 3]],
        };
        // The only rank is the root and contributes nothing, so the size
        // matrix is all zero and the received buffer is empty, not an error.
        let result = gather_table(&ctx, &serializer, 0, false, &ArrowAllocator).unwrap();
        assert_eq!(result.all_buffer_sizes, vec![0]);
        assert!(result.received_buffers[0].is_empty());
    }

    #[test]
    fn test_serializer_shape_mismatch_is_invalid() {
        struct Lying;
        impl TableSerializer for Lying {
            fn buffer_sizes(&self) -> Vec<u32> {
                vec![4, 4]
            }
            fn empty_buffer_sizes(&self) -> Vec<u32> {
                vec![0, 0]
            }
            fn data_buffers(&self) -> Vec<&[u8]> {
                vec![&[1, 2, 3, 4]]
            }
        }
        let ctx = local_ctx();
        let err = gather_table(&ctx, &Lying, 0, true, &ArrowAllocator).unwrap_err();
        assert_eq!(err.code(), Code::Invalid);
    }

    #[test]
    fn test_single_rank_gather_buffer_slices() {
        let ctx = local_ctx();
        let buf = arrow::buffer::Buffer::from_slice_ref([5u8, 6, 7]);
        let slices = gather_buffer(&ctx, &buf, 0).unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].as_slice(), &[5, 6, 7]);
    }
}
