//! Identity storage over MySQL, PostgreSQL and SQLite.
//!
//! - [`Connector`] owns one backend's pool and hands out single connections
//!   that go back to the pool when dropped
//! - [`Dialect`] hides the SQL that differs per backend, most notably the
//!   insert-or-skip statement used for bulk imports
//! - [`IdentityStore`] is the canonical CRUD surface; [`SqlIdentityStore`]
//!   implements it once for every backend
//!
//! A connection lost after startup raises the shared halt signal and fails the
//! operation with [`DatabaseError::Transient`].
//!
//! ## Example
//!
//! ```no_run
//! use gatekeep::db::{Connector, ConnectorConfig, IdentityStore, SqlIdentityStore};
//! use gatekeep::runtime::Halt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), gatekeep::db::DatabaseError> {
//! let connector = Arc::new(Connector::new(ConnectorConfig::sqlite("gatekeep.db"), Halt::new()));
//! connector.connect().await?;
//!
//! let store = SqlIdentityStore::new(connector.clone());
//! store.validate_schema().await?;
//! let bob = store.get_by_name("bob").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod dialect;
pub mod errors;
pub mod models;
pub mod registry;
pub mod repository;

pub use config::{BackendKind, ConnectorConfig};
pub use connector::{Connection, Connector};
pub use dialect::{Dialect, IDENTITY_COLUMNS, dialect_for};
pub use errors::{DatabaseError, DatabaseResult};
pub use models::IdentityRow;
pub use registry::{backend_for_store, open_store, store_ids};
pub use repository::{IDENTITY_TABLE, IdentityStore, SqlIdentityStore};
