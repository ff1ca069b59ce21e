//! Credential data models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hashed password tagged with the algorithm that produced it.
///
/// Self-describing formats (bcrypt, Argon2 PHC strings) keep their salt and
/// cost inside `hash` and leave `salt` empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: Option<String>,
    pub algorithm: String,
}

impl HashedPassword {
    pub fn new(hash: impl Into<String>, salt: Option<String>, algorithm: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            salt,
            algorithm: algorithm.into(),
        }
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .field("salt", &self.salt.as_ref().map(|_| "[SALT]"))
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Outcome of checking a plaintext against a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Plaintext does not match
    Mismatch,

    /// Plaintext matches; `upgrade` is set when the stored record is not in
    /// the configured default algorithm and should be re-hashed on the next
    /// identity update
    Match { upgrade: bool },
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match { .. })
    }

    pub fn needs_upgrade(&self) -> bool {
        matches!(self, Verification::Match { upgrade: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redaction() {
        let hashed = HashedPassword::new("deadbeef", Some("pepper".to_string()), "SHA-256");
        let debug_output = format!("{:?}", hashed);
        assert!(!debug_output.contains("deadbeef"));
        assert!(!debug_output.contains("pepper"));
        assert!(debug_output.contains("SHA-256"));
    }

    #[test]
    fn test_verification_flags() {
        assert!(!Verification::Mismatch.is_match());
        assert!(Verification::Match { upgrade: false }.is_match());
        assert!(Verification::Match { upgrade: true }.needs_upgrade());
        assert!(!Verification::Match { upgrade: false }.needs_upgrade());
    }
}
