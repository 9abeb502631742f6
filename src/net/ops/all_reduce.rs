// In: src/net/ops/all_reduce.rs

//! Element-wise all-reduce over a contiguous buffer of logical-typed values.

use crate::ctx::SelatContext;
use crate::error::{SelatError, SelatResult};
use crate::net::wire::{wire_op_of, wire_type_of};
use crate::net::ReduceOp;
use crate::types::SelatDataType;

/// Combines `count` elements of `data_type` across all ranks into `recv` on
/// every rank, using `op`.
///
/// The logical type and operator are mapped onto the backend's native
/// encodings first; if either is unmapped the call fails `NotImplemented`
/// without issuing any native call, so no partial native state is left
/// behind.
///
/// Collective: every rank must call this with the same count, type and
/// operator, in the same position of its collective-call sequence.
pub fn all_reduce(
    ctx: &SelatContext,
    send: &[u8],
    recv: &mut [u8],
    count: usize,
    data_type: &SelatDataType,
    op: ReduceOp,
) -> SelatResult<()> {
    let ty = wire_type_of(data_type).ok_or_else(|| {
        SelatError::NotImplemented(format!("no native wire type for {}", data_type))
    })?;
    let wire_op = wire_op_of(op).ok_or_else(|| {
        SelatError::NotImplemented(format!("no native operator for {:?}", op))
    })?;

    let nbytes = count * ty.size_bytes();
    if send.len() != nbytes || recv.len() != nbytes {
        return Err(SelatError::Invalid(format!(
            "allreduce of {} x {} needs {} bytes, got send {} / recv {}",
            count,
            data_type,
            nbytes,
            send.len(),
            recv.len()
        )));
    }

    ctx.communicator().all_reduce(send, recv, count, ty, wire_op)
}

//==================================================================================
// Unit Tests
//==================================================================================
