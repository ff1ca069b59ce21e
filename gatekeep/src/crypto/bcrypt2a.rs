//! Adaptive bcrypt provider.

use super::{
    errors::{CryptoError, CryptoResult},
    models::HashedPassword,
    provider::CryptoProvider,
};

/// bcrypt only consumes the first 72 bytes of its input
pub const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

/// Default work factor
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Produces `$2a$` strings and verifies any `$2a$`/`$2b$`/`$2y$` string.
///
/// Records are stored verbatim in `hash`; cost and salt are read from the
/// string itself and never from configuration.
pub struct BCrypt2AProvider {
    cost: u32,
}

impl BCrypt2AProvider {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BCrypt2AProvider {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl CryptoProvider for BCrypt2AProvider {
    fn identifier(&self) -> &'static str {
        "BCrypt-2A"
    }

    fn max_plaintext_len(&self) -> usize {
        BCRYPT_MAX_PASSWORD_BYTES
    }

    fn plaintext_len(&self, password: &str) -> usize {
        password.len()
    }

    fn create_hash(&self, password: &str) -> CryptoResult<HashedPassword> {
        let parts = bcrypt::hash_with_result(password, self.cost)
            .map_err(|e| CryptoError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword::new(
            parts.format_for_version(bcrypt::Version::TwoA),
            None,
            self.identifier(),
        ))
    }

    fn matches(&self, input: &str, stored: &HashedPassword) -> bool {
        // bcrypt::verify compares the decoded digests in constant time
        bcrypt::verify(input, &stored.hash).unwrap_or(false)
    }
}
