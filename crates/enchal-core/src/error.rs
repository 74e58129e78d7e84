//! Error types for enchal.

use thiserror::Error;

/// Main error type for enchal operations.
#[derive(Error, Debug)]
pub enum EnchalError {
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("No tracked buffer slot available: {0}")]
    SlotExhausted(String),

    #[error("Invalid resource tag: {0:#06x}")]
    InvalidTag(u16),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for enchal operations.
pub type Result<T> = std::result::Result<T, EnchalError>;
