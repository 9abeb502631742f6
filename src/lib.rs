//! This file is the root of the `selat` Rust crate.
//!
//! selat is the distributed execution substrate of a parallel tabular-data
//! engine: a process-group abstraction ([`SelatContext`]) plus a collective
//! data-movement layer (`net::ops`) that moves columnar table fragments,
//! several variable-size byte buffers per rank rather than fixed-size scalars,
//! between cooperating worker processes.
//!
//! The relational operators that consume this crate (shuffle, join, sort,
//! union) obtain a context once at process start, then drive the collective
//! engine with a serializer/allocator pair. Every collective call must be
//! issued by every rank in the same relative order; see `net` for the
//! ordering contract.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod ctx;
pub mod error;
pub mod net;
pub mod table;
pub mod types;

//==================================================================================
// 2. Re-exports
//==================================================================================
pub use ctx::SelatContext;
pub use error::{Code, SelatError, SelatResult};

/// Turns on verbose logging for the whole process. Safe to call more than
/// once; later calls are no-ops.
pub fn enable_verbose_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
