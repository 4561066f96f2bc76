//! Common error types for panoscout

use thiserror::Error;

/// Common result type for panoscout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across panoscout crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (malformed tags, bad dates)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
