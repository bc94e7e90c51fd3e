//! # Error Types
//!
//! Errors raised while building shared entities from untrusted bytes.

use thiserror::Error;

/// Conversion errors for fixed-width identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Input had the wrong byte length.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Input was not valid hex.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}
