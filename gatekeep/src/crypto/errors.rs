//! Credential codec error types.

use thiserror::Error;

/// Credential codec errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No provider is registered under this algorithm id
    #[error("Unknown crypto provider: {0}")]
    UnknownProvider(String),

    /// Provider can verify but never produce hashes
    #[error("Crypto provider {0} is legacy-only and cannot be used for new hashes")]
    LegacyOnly(String),

    /// Plaintext exceeds what the algorithm can process
    #[error("Password is too long for {algorithm} (max {max} bytes, got {actual})")]
    PlaintextTooLong {
        algorithm: String,
        max: usize,
        actual: usize,
    },

    /// Hash computation failed
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Stored credential cannot be interpreted by its provider
    #[error("Malformed {algorithm} credential")]
    MalformedCredential { algorithm: String },
}

/// Result type for credential codec operations
pub type CryptoResult<T> = Result<T, CryptoError>;
