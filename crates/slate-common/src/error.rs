//! Common error types for Slate.

use thiserror::Error;

/// Result type alias using Slate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Slate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file, path resolution, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }
}
