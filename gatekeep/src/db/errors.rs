//! Storage error types.

use super::config::BackendKind;
use thiserror::Error;

/// Storage errors
///
/// `Connection`, `Transient` and `Schema` are fatal to the host; the rest are
/// per-operation failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Could not open the pool at all
    #[error("Failed to connect to {backend} database: {source}")]
    Connection {
        backend: BackendKind,
        #[source]
        source: sqlx::Error,
    },

    /// Connection lost mid-operation; the halt signal has been raised
    #[error("Storage connection lost: {0}")]
    Transient(#[source] sqlx::Error),

    /// Live table does not carry the canonical columns
    #[error("Table {table} is missing columns: {}", missing.join(", "))]
    Schema { table: String, missing: Vec<String> },

    /// Query failed for a non-connection reason
    #[error("Query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Unique constraint hit on insert
    #[error("Identity already exists: {0}")]
    Conflict(String),

    /// Update target does not exist
    #[error("Identity not found: {0}")]
    NotFound(uuid::Uuid),

    /// A stored value could not be mapped back to the model
    #[error("Corrupt row for {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// Used before `connect()` or after `disconnect()`
    #[error("Connector is not connected")]
    Disconnected,

    /// No store registered under this id
    #[error("Unknown store type: {0}")]
    UnknownStore(String),
}

impl DatabaseError {
    /// Whether the host must shut down on this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DatabaseError::Connection { .. } | DatabaseError::Transient(_) | DatabaseError::Schema { .. }
        )
    }
}

/// Result type for storage operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
