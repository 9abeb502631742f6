// In: src/net/serialize.rs

//! The serializer contract the table collectives consume: a table fragment
//! exposed as an ordered list of raw byte buffers plus their sizes, without
//! the collective layer understanding the table's schema.

/// Exposes one rank's table fragment to the collective engine.
///
/// The three accessors describe buffers in a fixed, caller-agreed order (the
/// same order on every rank, e.g. one entry per physical column buffer);
/// `buffer_sizes`, `empty_buffer_sizes` and `data_buffers` must all have the
/// same length.
pub trait TableSerializer {
    /// Byte sizes of this rank's real contribution, in buffer order.
    fn buffer_sizes(&self) -> Vec<u32>;

    /// The all-zero size vector of the same length, used when this rank
    /// participates in size negotiation but contributes no payload (e.g., the
    /// root of a gather that only wants the others' rows).
    fn empty_buffer_sizes(&self) -> Vec<u32>;

    /// The raw bytes of this rank's contribution, in the same order and with
    /// at least the lengths reported by [`buffer_sizes`](Self::buffer_sizes).
    fn data_buffers(&self) -> Vec<&[u8]>;
}
