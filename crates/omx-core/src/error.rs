//! Error types for omx-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(i64),

    #[error("Invalid quantity: {0}")]
    InvalidQty(i64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
