// In: src/net/ops/mod.rs

//! The collective engine: gather, all-gather and all-reduce algorithms built
//! on top of a [`Communicator`](crate::net::Communicator).
//!
//! The table-moving operations share one shape: negotiate per-rank buffer
//! sizes with a fixed-size collective, compute totals and per-rank byte
//! displacements on the receiving side, then move each logical buffer with
//! one variable-size collective into a freshly allocated destination.
//!
//! Size bookkeeping uses the flattened rank-major matrix convention: for
//! `world_size` ranks and `num_buffers` logical buffers, `all_buffer_sizes`
//! has length `world_size * num_buffers` and entry `[w * num_buffers + i]` is
//! rank `w`'s byte size for buffer `i`.

mod all_gather;
mod all_reduce;
mod gather;

pub use all_gather::{all_gather_buffer, all_gather_table};
pub use all_reduce::all_reduce;
pub use gather::{gather_buffer, gather_table};

use crate::error::{SelatError, SelatResult};
use crate::net::Buffer;

/// The result set of a table gather/all-gather.
///
/// On ranks the operation does not populate (every non-root rank of a
/// gather), all three fields stay empty.
#[derive(Default)]
pub struct TableGatherResult {
    /// Flattened rank-major `world_size x num_buffers` size matrix.
    pub all_buffer_sizes: Vec<u32>,
    /// One freshly allocated buffer per logical buffer index, holding every
    /// rank's contribution for that index concatenated in rank order.
    pub received_buffers: Vec<Box<dyn Buffer>>,
    /// Per logical buffer index, each rank's byte offset into the
    /// corresponding received buffer. `displacements[i][0] == 0` and the
    /// sequence is non-decreasing.
    pub displacements: Vec<Vec<u32>>,
}

impl std::fmt::Debug for TableGatherResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableGatherResult")
            .field("all_buffer_sizes", &self.all_buffer_sizes)
            .field("received_buffers", &self.received_buffers.len())
            .field("displacements", &self.displacements)
            .finish()
    }
}

/// Per logical buffer, the total byte size received across all ranks.
pub(crate) fn total_buffer_sizes(
    all_buffer_sizes: &[u32],
    num_buffers: usize,
    world_size: usize,
) -> Vec<u32> {
    let mut totals = vec![0u32; num_buffers];
    for w in 0..world_size {
        for i in 0..num_buffers {
            totals[i] += all_buffer_sizes[w * num_buffers + i];
        }
    }
    totals
}

/// Per-rank byte counts for one logical buffer (one column of the matrix).
pub(crate) fn receive_counts(
    all_buffer_sizes: &[u32],
    receive_no: usize,
    num_buffers: usize,
    world_size: usize,
) -> Vec<u32> {
    (0..world_size)
        .map(|w| all_buffer_sizes[w * num_buffers + receive_no])
        .collect()
}

/// Per-rank byte displacements for one logical buffer: the exclusive prefix
/// sum of that buffer's per-rank sizes.
pub(crate) fn displacements_per_buffer(
    all_buffer_sizes: &[u32],
    receive_no: usize,
    num_buffers: usize,
    world_size: usize,
) -> Vec<u32> {
    let mut displs = vec![0u32; world_size];
    for w in 0..world_size - 1 {
        displs[w + 1] = displs[w] + all_buffer_sizes[w * num_buffers + receive_no];
    }
    displs
}

/// Validates that every rank entered the collective with the same number of
/// logical buffers, via a one-`u32` all-to-all exchange run before any
/// payload movement. Every rank sees the same count vector, so on a mismatch
/// every rank fails with the same `Invalid` error and the group stays in
/// step.
pub(crate) fn check_uniform_num_buffers(
    comm: &dyn crate::net::Communicator,
    num_buffers: usize,
) -> SelatResult<()> {
    let world = comm.world_size() as usize;
    let send = (num_buffers as u32).to_le_bytes();
    let mut recv = vec![0u8; 4 * world];
    comm.all_gather(&send, &mut recv)?;
    let counts = u32s_from_le_bytes(&recv);
    if counts.iter().any(|&c| c != num_buffers as u32) {
        return Err(SelatError::Invalid(format!(
            "ranks disagree on the number of logical buffers: {:?}",
            counts
        )));
    }
    Ok(())
}

/// Size vectors travel as little-endian `u32`s.
pub(crate) fn u32s_to_le_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn u32s_from_le_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

//==================================================================================
// Unit Tests
//==================================================================================
