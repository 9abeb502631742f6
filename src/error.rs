// In: src/error.rs

//! This module defines the single, unified error type for the entire selat library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every fallible operation in the crate returns a `SelatResult<T>`; nothing throws.
//! The coarse failure category callers branch on is recovered with
//! [`SelatError::code`].

use thiserror::Error;

/// The coarse failure category attached to every error value.
///
/// Callers that only care about *what kind* of failure occurred (rather than
/// the exact variant) should match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// The caller misused the API (bad argument, violated precondition).
    Invalid,
    /// A recognized-but-unsupported data type, reduction operator, or backend
    /// kind was requested. Guaranteed to be detected before any native
    /// communication call is issued.
    NotImplemented,
    /// The underlying communication backend failed; the message carries the
    /// backend's diagnostic text verbatim.
    ExecutionError,
    /// An I/O level failure outside a collective call.
    IoError,
}

#[derive(Error, Debug)]
pub enum SelatError {
    // =========================================================================
    // === High-Level, Semantic Errors (Specific to our library's logic)
    // =========================================================================
    #[error("Invalid argument: {0}")]
    Invalid(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Execution failed: {0}")]
    ExecutionError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem (e.g., a socket
    /// failure outside a collective call).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while moving schema
    /// metadata through a single-buffer collective.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl SelatError {
    /// Returns the coarse failure category for this error.
    pub fn code(&self) -> Code {
        match self {
            SelatError::Invalid(_) => Code::Invalid,
            SelatError::NotImplemented(_) => Code::NotImplemented,
            SelatError::ExecutionError(_) => Code::ExecutionError,
            SelatError::Arrow(_) => Code::ExecutionError,
            SelatError::Io(_) => Code::IoError,
            SelatError::SerdeJson(_) => Code::Invalid,
        }
    }
}

pub type SelatResult<T> = Result<T, SelatError>;

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_recovery() {
        assert_eq!(SelatError::Invalid("x".into()).code(), Code::Invalid);
        assert_eq!(
            SelatError::NotImplemented("x".into()).code(),
            Code::NotImplemented
        );
        assert_eq!(
            SelatError::ExecutionError("x".into()).code(),
            Code::ExecutionError
        );
    }

    #[test]
    fn test_io_wrapper_preserves_message() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SelatError::from(io);
        assert_eq!(err.code(), Code::IoError);
        assert!(err.to_string().contains("refused"));
    }
}
