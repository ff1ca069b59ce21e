//! Salted fast-digest providers (SHA-256 / SHA-512) and the LogIt variant.

use super::{
    errors::{CryptoError, CryptoResult},
    models::HashedPassword,
    provider::CryptoProvider,
};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

/// Length of generated salts
const SALT_LENGTH: usize = 16;

/// Digest function backing a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Lowercase hex digest of `input`
    pub fn plain_hash(&self, input: &str) -> String {
        match self {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(input.as_bytes())),
            DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(input.as_bytes())),
        }
    }
}

fn random_salt() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

fn constant_time_hex_eq(computed: &str, stored: &str) -> bool {
    let stored = stored.trim().to_ascii_lowercase();
    computed.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// `hex(H(hex(H(password)) + salt))`, the layout shared with AuthMe-style dumps.
///
/// Records without a salt are checked as a bare `hex(H(password))`.
pub struct MessageDigestProvider {
    identifier: &'static str,
    algorithm: DigestAlgorithm,
}

impl MessageDigestProvider {
    pub fn sha256() -> Self {
        Self {
            identifier: "SHA-256",
            algorithm: DigestAlgorithm::Sha256,
        }
    }

    pub fn sha512() -> Self {
        Self {
            identifier: "SHA-512",
            algorithm: DigestAlgorithm::Sha512,
        }
    }

    fn salted(&self, password: &str, salt: &str) -> String {
        let inner = self.algorithm.plain_hash(password);
        self.algorithm.plain_hash(&format!("{inner}{salt}"))
    }
}

impl CryptoProvider for MessageDigestProvider {
    fn identifier(&self) -> &'static str {
        self.identifier
    }

    fn create_hash(&self, password: &str) -> CryptoResult<HashedPassword> {
        let salt = random_salt();
        let hash = self.salted(password, &salt);
        Ok(HashedPassword::new(hash, Some(salt), self.identifier))
    }

    fn matches(&self, input: &str, stored: &HashedPassword) -> bool {
        let computed = match stored.salt.as_deref() {
            Some(salt) => self.salted(input, salt),
            None => self.algorithm.plain_hash(input),
        };
        constant_time_hex_eq(&computed, &stored.hash)
    }
}

/// LogIt stores `hex(SHA-256(password + salt))`. Verify-only.
pub struct LogItDigestProvider {
    algorithm: DigestAlgorithm,
}

impl LogItDigestProvider {
    pub fn new() -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
        }
    }
}

impl Default for LogItDigestProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for LogItDigestProvider {
    fn identifier(&self) -> &'static str {
        "LOGIT-SHA-256"
    }

    fn legacy_only(&self) -> bool {
        true
    }

    fn create_hash(&self, _password: &str) -> CryptoResult<HashedPassword> {
        Err(CryptoError::LegacyOnly(self.identifier().to_string()))
    }

    fn matches(&self, input: &str, stored: &HashedPassword) -> bool {
        let salt = stored.salt.as_deref().unwrap_or_default();
        let computed = self.algorithm.plain_hash(&format!("{input}{salt}"));
        constant_time_hex_eq(&computed, &stored.hash)
    }
}
