// In: src/net/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Communication Layer
// ====================================================================================
//
// `net` is the wire-facing half of the crate. It is split the same way the
// engine thinks about data movement:
//
//   1. [Backend (`Communicator` impls)]  -> owns the native group handle and moves
//         |                                 raw bytes: fixed-size and variable-size
//         |                                 gathers, all-gathers, a byte-level
//         |                                 all-reduce, broadcast, barrier.
//         |
//   2. [Wire mapping (`wire`)]           -> translates logical data types and
//         |                                 reduction operators onto the closed set
//         |                                 of element encodings a backend natively
//         |                                 understands. Unmapped -> NotImplemented,
//         |                                 before any native call.
//         |
//   3. [Collective engine (`ops`)]       -> the multi-buffer algorithms: size
//                                           negotiation, displacement computation,
//                                           per-buffer allocation and transfer.
//
// Every operation in (3) is collective: all ranks must invoke the same
// operation in the same relative order, or the group deadlocks. That ordering
// contract is the caller's to uphold; nothing here can detect a violation.
// ====================================================================================

pub mod buffer;
pub mod config;
pub mod local;
pub mod ops;
pub mod serialize;
pub mod tcp;
pub mod wire;

pub use buffer::{Allocator, ArrowAllocator, Buffer};
pub use config::{CommConfig, RdmaCommConfig, TcpCommConfig};
pub use local::LocalCommunicator;
pub use serialize::TableSerializer;
pub use tcp::TcpCommunicator;

use crate::error::SelatResult;
use serde::{Deserialize, Serialize};
use wire::{WireOp, WireType};

/// The communication backend kinds the engine recognizes.
///
/// All kinds are declared in one build artifact; `CommConfig` selects one at
/// context-creation time. `Rdma` and `Stream` are recognized but currently
/// report `NotImplemented` at init.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommType {
    /// The degenerate single-process backend; also the sentinel a
    /// non-distributed context reports.
    Local,
    /// The message-passing backend: a blocking full mesh of TCP streams.
    Tcp,
    /// RDMA transport. Recognized, not implemented.
    Rdma,
    /// Reserved stream-transport kind. Recognized, not implemented.
    Stream,
}

/// Logical reduction operators, independent of any backend's native encoding.
///
/// Every member is commutative and associative over the element types the
/// wire mapping admits for it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
    Prod,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseOr,
}

/// The polymorphic communication backend a distributed context owns.
///
/// Implementations provide group identity plus the byte-oriented native
/// collective primitives the engine in [`ops`](crate::net::ops) drives. All
/// primitives are blocking: they return once the matching calls on every
/// peer have been issued and the data movement completed.
///
/// A communicator is exclusively owned by the context that created it and is
/// not safe for concurrent use from multiple threads of one process; callers
/// needing that must add their own mutual exclusion.
pub trait Communicator: Send {
    /// This process's 0-based identity within the group.
    fn rank(&self) -> i32;

    /// The group cardinality.
    fn world_size(&self) -> i32;

    /// The backend kind tag.
    fn comm_type(&self) -> CommType;

    /// Blocks until every rank has entered the barrier.
    fn barrier(&self) -> SelatResult<()>;

    /// Releases backend resources. Must be called at most once; the
    /// communicator must not be used afterwards.
    fn finalize(&mut self) -> SelatResult<()>;

    /// Fixed-size gather: every rank contributes exactly `send.len()` bytes
    /// (the same length on all ranks); on `root`, `recv` must be
    /// `world_size * send.len()` bytes and receives the contributions in rank
    /// order. Non-root ranks pass `None`.
    fn gather(&self, send: &[u8], root: i32, recv: Option<&mut [u8]>) -> SelatResult<()>;

    /// Variable-size gather: each rank contributes `send.len()` bytes; the
    /// root supplies the destination together with the per-rank byte counts
    /// and displacements it computed from a prior size negotiation.
    /// `counts[rank]` must equal that rank's `send.len()`.
    fn gather_v(
        &self,
        send: &[u8],
        root: i32,
        recv: Option<(&mut [u8], &[u32], &[u32])>,
    ) -> SelatResult<()>;

    /// Fixed-size all-gather: like [`gather`](Communicator::gather), but every
    /// rank receives the full concatenation.
    fn all_gather(&self, send: &[u8], recv: &mut [u8]) -> SelatResult<()>;

    /// Variable-size all-gather: every rank supplies the destination plus the
    /// (identical) per-rank counts and displacements, and every rank ends up
    /// with identical contents.
    fn all_gather_v(
        &self,
        send: &[u8],
        recv: &mut [u8],
        counts: &[u32],
        displs: &[u32],
    ) -> SelatResult<()>;

    /// Element-wise all-reduce over `count` elements of the given wire type,
    /// combining with `op`; the result lands in `recv` on every rank. Both
    /// slices must be exactly `count * ty.size_bytes()` long (the engine
    /// validates this before calling).
    fn all_reduce(
        &self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        ty: WireType,
        op: WireOp,
    ) -> SelatResult<()>;

    /// Broadcast `buf` from `root` to every rank.
    fn broadcast(&self, buf: &mut [u8], root: i32) -> SelatResult<()>;
}
