//! Pluggable password hashing.
//!
//! Every stored credential carries the id of the algorithm that produced it,
//! so records imported from other products keep verifying after migration:
//! - `SHA-256` / `SHA-512`: salted fast digests
//! - `BCrypt-2A`: adaptive, cost embedded in the stored string
//! - `Argon2ID`: memory-hard, PHC string stored verbatim
//! - `LOGIT-SHA-256`: verify-only legacy layout
//!
//! New hashes always use the configured default. A successful check against
//! any other algorithm is reported as [`Verification::Match`] with
//! `upgrade: true` so the caller can re-hash on its next identity update.
//!
//! ## Example
//!
//! ```
//! use gatekeep::crypto::CryptoRegistry;
//!
//! let registry = CryptoRegistry::with_builtin("SHA-256").unwrap();
//! let stored = registry.hash("correct horse").unwrap();
//! assert!(registry.verify("correct horse", &stored).unwrap().is_match());
//! ```

pub mod argon2id;
pub mod bcrypt2a;
pub mod errors;
pub mod message_digest;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{CryptoError, CryptoResult};
pub use models::{HashedPassword, Verification};
pub use provider::{CryptoProvider, MAX_PASSWORD_LENGTH};
pub use registry::CryptoRegistry;
