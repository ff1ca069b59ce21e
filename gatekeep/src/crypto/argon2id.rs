//! Memory-hard Argon2id provider.

use super::{
    errors::{CryptoError, CryptoResult},
    models::HashedPassword,
    provider::CryptoProvider,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Argon2id with the crate's default (OWASP) parameters; PHC strings are
/// stored verbatim, so parameters of older records keep verifying.
#[derive(Default)]
pub struct Argon2IdProvider;

impl Argon2IdProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for Argon2IdProvider {
    fn identifier(&self) -> &'static str {
        "Argon2ID"
    }

    fn create_hash(&self, password: &str) -> CryptoResult<HashedPassword> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CryptoError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword::new(hash.to_string(), None, self.identifier()))
    }

    fn matches(&self, input: &str, stored: &HashedPassword) -> bool {
        let parsed_hash = match PasswordHash::new(&stored.hash) {
            Ok(h) => h,
            Err(_) => {
                log::warn!("Stored Argon2 record is not a valid PHC string");
                return false;
            }
        };

        // Argon2 uses constant-time comparison internally
        Argon2::default()
            .verify_password(input.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
