//! Registry of hashing algorithms keyed by algorithm id.

use super::{
    argon2id::Argon2IdProvider,
    bcrypt2a::{BCrypt2AProvider, DEFAULT_BCRYPT_COST},
    errors::{CryptoError, CryptoResult},
    message_digest::{LogItDigestProvider, MessageDigestProvider},
    models::{HashedPassword, Verification},
    provider::CryptoProvider,
};
use std::{collections::HashMap, sync::Arc};

/// Maps algorithm ids to providers and hashes every new password with the
/// configured default.
#[derive(Clone)]
pub struct CryptoRegistry {
    providers: HashMap<String, Arc<dyn CryptoProvider>>,
    default_id: String,
}

impl CryptoRegistry {
    /// Registry holding every built-in provider, defaulting to `default_id`
    ///
    /// # Errors
    ///
    /// * `CryptoError::UnknownProvider` - `default_id` is not registered
    /// * `CryptoError::LegacyOnly` - `default_id` cannot produce hashes
    pub fn with_builtin(default_id: &str) -> CryptoResult<Self> {
        Self::with_builtin_cost(default_id, DEFAULT_BCRYPT_COST)
    }

    /// Same as [`CryptoRegistry::with_builtin`] with an explicit bcrypt cost
    pub fn with_builtin_cost(default_id: &str, bcrypt_cost: u32) -> CryptoResult<Self> {
        let builtin: Vec<Arc<dyn CryptoProvider>> = vec![
            Arc::new(MessageDigestProvider::sha256()),
            Arc::new(MessageDigestProvider::sha512()),
            Arc::new(BCrypt2AProvider::new(bcrypt_cost)),
            Arc::new(Argon2IdProvider::new()),
            Arc::new(LogItDigestProvider::new()),
        ];

        let mut registry = Self {
            providers: HashMap::new(),
            default_id: default_id.to_string(),
        };
        for provider in builtin {
            registry.register(provider);
        }

        registry.check_default()?;
        Ok(registry)
    }

    /// Register (or replace) a provider under its own identifier
    pub fn register(&mut self, provider: Arc<dyn CryptoProvider>) {
        self.providers
            .insert(provider.identifier().to_string(), provider);
    }

    /// Switch the default algorithm used for new hashes
    pub fn set_default(&mut self, default_id: &str) -> CryptoResult<()> {
        let previous = std::mem::replace(&mut self.default_id, default_id.to_string());
        if let Err(e) = self.check_default() {
            self.default_id = previous;
            return Err(e);
        }
        Ok(())
    }

    fn check_default(&self) -> CryptoResult<()> {
        let provider = self
            .providers
            .get(&self.default_id)
            .ok_or_else(|| CryptoError::UnknownProvider(self.default_id.clone()))?;

        if provider.legacy_only() {
            return Err(CryptoError::LegacyOnly(self.default_id.clone()));
        }

        Ok(())
    }

    pub fn provider(&self, id: &str) -> Option<&Arc<dyn CryptoProvider>> {
        self.providers.get(id)
    }

    pub fn supports(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Registered algorithm ids, sorted
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Hash `password` with the default algorithm
    ///
    /// # Errors
    ///
    /// * `CryptoError::PlaintextTooLong` - Plaintext exceeds the algorithm bound
    /// * `CryptoError::HashingFailed` - The underlying hasher failed
    pub fn hash(&self, password: &str) -> CryptoResult<HashedPassword> {
        let provider = self
            .providers
            .get(&self.default_id)
            .ok_or_else(|| CryptoError::UnknownProvider(self.default_id.clone()))?;

        let max = provider.max_plaintext_len();
        let actual = provider.plaintext_len(password);
        if actual > max {
            return Err(CryptoError::PlaintextTooLong {
                algorithm: self.default_id.clone(),
                max,
                actual,
            });
        }

        provider.create_hash(password)
    }

    /// Check `password` against `stored` using the provider named by the record
    ///
    /// A match on a record that is not in the default algorithm reports
    /// `upgrade: true`; persisting the re-hashed record is up to the caller.
    ///
    /// # Errors
    ///
    /// * `CryptoError::UnknownProvider` - The record's algorithm is not registered
    pub fn verify(&self, password: &str, stored: &HashedPassword) -> CryptoResult<Verification> {
        let provider = self
            .providers
            .get(&stored.algorithm)
            .ok_or_else(|| CryptoError::UnknownProvider(stored.algorithm.clone()))?;

        if provider.plaintext_len(password) > provider.max_plaintext_len() {
            return Ok(Verification::Mismatch);
        }

        if provider.matches(password, stored) {
            Ok(Verification::Match {
                upgrade: stored.algorithm != self.default_id,
            })
        } else {
            Ok(Verification::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{MAX_PASSWORD_LENGTH, message_digest::DigestAlgorithm};

    #[test]
    fn test_unknown_default_rejected() {
        let result = CryptoRegistry::with_builtin("MD4");
        assert!(matches!(result, Err(CryptoError::UnknownProvider(_))));
    }

    #[test]
    fn test_legacy_default_rejected() {
        let result = CryptoRegistry::with_builtin("LOGIT-SHA-256");
        assert!(matches!(result, Err(CryptoError::LegacyOnly(_))));
    }

    #[test]
    fn test_builtin_identifiers() {
        let registry = CryptoRegistry::with_builtin("SHA-256").unwrap();
        assert_eq!(
            registry.identifiers(),
            vec!["Argon2ID", "BCrypt-2A", "LOGIT-SHA-256", "SHA-256", "SHA-512"]
        );
    }

    #[test]
    fn test_hash_rejects_oversized_plaintext() {
        let registry = CryptoRegistry::with_builtin_cost("BCrypt-2A", 4).unwrap();
        let result = registry.hash(&"a".repeat(73));
        assert!(matches!(result, Err(CryptoError::PlaintextTooLong { max: 72, .. })));
        assert!(registry.hash(&"a".repeat(72)).is_ok());

        // 36 characters, 72 bytes
        assert!(registry.hash(&"é".repeat(36)).is_ok());
        assert!(matches!(
            registry.hash(&"é".repeat(37)),
            Err(CryptoError::PlaintextTooLong { max: 72, actual: 74, .. })
        ));
    }

    #[test]
    fn test_digest_bound_counts_characters() {
        let registry = CryptoRegistry::with_builtin("SHA-256").unwrap();
        let password = "пароль".repeat(20);
        assert_eq!(password.chars().count(), 120);
        assert!(password.len() > MAX_PASSWORD_LENGTH);

        let stored = registry.hash(&password).unwrap();
        assert!(registry.verify(&password, &stored).unwrap().is_match());

        assert!(matches!(
            registry.hash(&"ü".repeat(129)),
            Err(CryptoError::PlaintextTooLong { max: 128, actual: 129, .. })
        ));
    }

    #[test]
    fn test_legacy_match_requests_upgrade() {
        let registry = CryptoRegistry::with_builtin("SHA-512").unwrap();
        let inner = DigestAlgorithm::Sha256.plain_hash("pa55word");
        let hash = DigestAlgorithm::Sha256.plain_hash(&format!("{inner}s1"));
        let stored = HashedPassword::new(hash, Some("s1".to_string()), "SHA-256");

        assert_eq!(
            registry.verify("pa55word", &stored).unwrap(),
            Verification::Match { upgrade: true }
        );
        assert_eq!(registry.verify("pa55wore", &stored).unwrap(), Verification::Mismatch);
    }

    #[test]
    fn test_default_match_needs_no_upgrade() {
        let registry = CryptoRegistry::with_builtin("SHA-256").unwrap();
        let stored = registry.hash("pa55word").unwrap();
        assert_eq!(
            registry.verify("pa55word", &stored).unwrap(),
            Verification::Match { upgrade: false }
        );
    }

    #[test]
    fn test_unknown_record_algorithm() {
        let registry = CryptoRegistry::with_builtin("SHA-256").unwrap();
        let stored = HashedPassword::new("x", None, "ROT13");
        assert!(matches!(
            registry.verify("x", &stored),
            Err(CryptoError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_set_default_keeps_previous_on_error() {
        let mut registry = CryptoRegistry::with_builtin("SHA-256").unwrap();
        assert!(registry.set_default("LOGIT-SHA-256").is_err());
        assert_eq!(registry.default_id(), "SHA-256");
        registry.set_default("Argon2ID").unwrap();
        assert_eq!(registry.default_id(), "Argon2ID");
    }
}
