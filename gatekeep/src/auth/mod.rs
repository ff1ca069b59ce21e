//! Per-connection authorization.
//!
//! A [`Session`] tracks one connection through
//! `Unauthenticated -> Authenticated`, with a detour through
//! `AwaitingSecondFactor` when a one-time code is required. The
//! [`AuthorizationProvider`] runs every command flow against the identity
//! store:
//! - register, password login, premium auto-login
//! - two-factor setup and challenge
//! - password change and e-mail based reset
//! - premium enable / confirm / disable
//! - disconnect handling (task cancellation, last server)
//!
//! ## Example
//!
//! ```no_run
//! use gatekeep::auth::{AuthSettings, AuthorizationProvider};
//! use gatekeep::crypto::CryptoRegistry;
//! use gatekeep::db::{Connector, ConnectorConfig, SqlIdentityStore};
//! use gatekeep::platform::StaticPlatform;
//! use gatekeep::runtime::{Halt, Scheduler, WorkerPool};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = Arc::new(Connector::new(ConnectorConfig::sqlite("gatekeep.db"), Halt::new()));
//!     connector.connect().await?;
//!     let store = Arc::new(SqlIdentityStore::new(connector));
//!
//!     let provider = AuthorizationProvider::new(
//!         store,
//!         Arc::new(CryptoRegistry::with_builtin("BCrypt-2A")?),
//!         WorkerPool::current(4),
//!         Scheduler::current(),
//!         Arc::new(StaticPlatform::new(".", "1.0.0")),
//!         AuthSettings::default(),
//!     );
//!
//!     let mut session = provider.on_connect("Bob", Some("10.0.0.1"), None).await?;
//!     provider.register(&mut session, "correct horse").await?;
//!     provider.on_disconnect(session).await?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod events;
pub mod locks;
pub mod manager;
pub mod models;
pub mod totp;

pub use errors::{AuthError, AuthResult};
pub use events::SecurityEvent;
pub use locks::IdentityLocks;
pub use manager::AuthorizationProvider;
pub use models::{
    AuthSettings, ChallengeKind, ResetTicket, Session, SessionState, TwoFactorChallenge,
};
