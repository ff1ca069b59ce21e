//! Error types for security module

use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimiterResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Key is inside its cool-down window
    #[error("Rate limit exceeded for {key}: retry after {retry_after}s")]
    Exceeded { key: String, retry_after: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}
