// In: src/net/buffer.rs

//! The owned-byte-region and allocation contracts the collective engine
//! consumes. The engine only ever requests capacity and writes into the
//! returned region; ownership of a received buffer passes to the caller.

use crate::error::SelatResult;
use arrow::buffer::MutableBuffer;

/// An owned, mutable byte region produced by an [`Allocator`].
pub trait Buffer: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_bytes(&self) -> &[u8];

    fn as_bytes_mut(&mut self) -> &mut [u8];
}

/// A factory for [`Buffer`]s.
///
/// An allocator may be shared read-only across the per-buffer allocation
/// requests of one collective call; the engine issues them sequentially.
pub trait Allocator: Send + Sync {
    /// Allocates an owned region of exactly `nbytes` bytes, zero-initialized.
    /// A zero-length request is valid.
    fn allocate(&self, nbytes: usize) -> SelatResult<Box<dyn Buffer>>;
}

/// The default allocator, backed by Arrow's `MutableBuffer` so received table
/// fragments share the allocation alignment of every other Arrow buffer in
/// the engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrowAllocator;

impl Allocator for ArrowAllocator {
    fn allocate(&self, nbytes: usize) -> SelatResult<Box<dyn Buffer>> {
        Ok(Box::new(ArrowBuffer(MutableBuffer::from_len_zeroed(
            nbytes,
        ))))
    }
}

/// A [`Buffer`] wrapping an Arrow `MutableBuffer`.
pub struct ArrowBuffer(MutableBuffer);

impl ArrowBuffer {
    /// Freezes this buffer into an immutable `arrow::buffer::Buffer`.
    pub fn into_arrow(self) -> arrow::buffer::Buffer {
        self.0.into()
    }
}

impl Buffer for ArrowBuffer {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.0.as_slice_mut()
    }
}
