//! Error types for the Mino client.

use thiserror::Error;

/// Result type for Mino client operations.
pub type Result<T> = std::result::Result<T, MinoError>;

/// Mino client errors.
#[derive(Debug, Error)]
pub enum MinoError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("API error: {0}")]
    Api(String),

    /// Parse error (invalid UTF-8 or unexpected stream framing)
    #[error("Parse error: {0}")]
    Parse(String),
}
