//! # Gatekeep
//!
//! Credential, identity and legacy-migration core of a game authentication
//! gateway. It decides whether a connecting player may act, keeps identities
//! in one canonical table on MySQL, PostgreSQL or SQLite, and bulk-imports
//! identities from other authentication products.
//!
//! ## Core Modules
//!
//! - [`crypto`]: Password hashing providers, legacy verification and lazy upgrade
//! - [`identity`]: Canonical identity record and deterministic id derivation
//! - [`db`]: Connector pools, SQL dialects and the identity store
//! - [`migrate`]: Format adapters and the read-all-then-insert import job
//! - [`auth`]: Session state machine and the authorization provider
//! - [`security`]: Rate limiting and expiring caches shared by session flows
//! - [`runtime`]: Worker pool, scheduler and the fatal-storage halt signal
//! - [`config`]: Typed configuration keys and startup validation
//! - [`platform`]: Capabilities the hosting process provides
//!
//! ## Example
//!
//! ```
//! use gatekeep::crypto::CryptoRegistry;
//!
//! let crypto = CryptoRegistry::with_builtin("SHA-256").unwrap();
//! let stored = crypto.hash("correct horse").unwrap();
//! assert!(crypto.verify("correct horse", &stored).unwrap().is_match());
//! ```

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod identity;
pub mod migrate;
pub mod platform;
pub mod runtime;
pub mod security;

pub use auth::{AuthError, AuthSettings, AuthorizationProvider, Session, SessionState};
pub use config::{ConfigError, GatekeepConfig};
pub use crypto::{CryptoError, CryptoRegistry, HashedPassword, Verification};
pub use db::{DatabaseError, IdentityStore};
pub use identity::{IdCreator, Identity, IdentityId};
pub use migrate::{ImportError, ImportJob, ImportReport};
