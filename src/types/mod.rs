//! This module defines the core, strongly-typed data representations used
//! throughout the selat engine.
//!
//! It currently includes the canonical `SelatDataType` enum, the logical type
//! tag every collective operation is parameterized by. The tag is independent
//! of any communication backend's native encoding; the mapping onto a
//! backend's wire types lives in `net::wire`.

pub mod data_type;

// Re-export the main type(s) for easier access.
pub use data_type::SelatDataType;
