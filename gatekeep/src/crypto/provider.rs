//! Hashing algorithm contract.

use super::{errors::CryptoResult, models::HashedPassword};

/// Upper bound on plaintext length (characters) for algorithms without their own limit
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// A password hashing algorithm registered under a stable id.
///
/// Implementations must be cheap to share across threads; adaptive and
/// memory-hard variants are expected to be called from the worker pool.
pub trait CryptoProvider: Send + Sync {
    /// Algorithm id persisted next to every hash this provider produces
    fn identifier(&self) -> &'static str;

    /// Whether the provider only verifies records imported from elsewhere
    fn legacy_only(&self) -> bool {
        false
    }

    /// Longest plaintext accepted by [`CryptoProvider::create_hash`], in the
    /// unit [`CryptoProvider::plaintext_len`] measures
    fn max_plaintext_len(&self) -> usize {
        MAX_PASSWORD_LENGTH
    }

    /// Length of `password` as bounded by [`CryptoProvider::max_plaintext_len`];
    /// characters unless the algorithm limits bytes
    fn plaintext_len(&self, password: &str) -> usize {
        password.chars().count()
    }

    /// Hash a plaintext that is already known to be within the length bound
    fn create_hash(&self, password: &str) -> CryptoResult<HashedPassword>;

    /// Check a plaintext against a record tagged with this provider's id
    fn matches(&self, input: &str, stored: &HashedPassword) -> bool;
}
