//! Migration error types.

use crate::db::{BackendKind, DatabaseError};
use thiserror::Error;

/// Per-row failure. The row is skipped and the import continues.
#[derive(Debug, Error)]
pub enum RowError {
    /// A column the adapter needs is NULL
    #[error("Missing value for {0}")]
    MissingValue(&'static str),

    /// An id column does not hold a UUID
    #[error("Invalid id in {column}: {value:?}")]
    InvalidId { column: &'static str, value: String },

    /// Password column is not in a layout the adapter understands
    #[error("Unrecognised password format: {0}")]
    CredentialFormat(String),

    /// Parsed credential names an algorithm the codec does not register
    #[error("Unsupported password algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Column value could not be decoded as the declared kind
    #[error("Cannot decode column {column}: {reason}")]
    Decode { column: &'static str, reason: String },
}

/// Job-level failure. The import is aborted and the target store untouched.
#[derive(Debug, Error)]
pub enum ImportError {
    /// No importer registered under this id
    #[error("Unknown migration type: {0}")]
    UnknownImporter(String),

    /// Importer targets another backend than the configured source
    #[error("Importer {importer} reads {expected} but the source database is {actual}")]
    BackendMismatch {
        importer: String,
        expected: BackendKind,
        actual: BackendKind,
    },

    /// Adapter has no default table and none was configured
    #[error("No source table configured for {0}")]
    MissingTable(String),

    /// Table name is not a plain identifier
    #[error("Invalid source table name: {0:?}")]
    InvalidTable(String),

    /// Source table lacks a column the adapter requires
    #[error("Source table {table} has no column {column}")]
    MissingColumn { table: String, column: &'static str },

    /// Could not connect to or read from the source database
    #[error("Source database error: {0}")]
    Source(#[source] DatabaseError),

    /// Bulk insert into the target store failed
    #[error("Target store error: {0}")]
    Target(#[source] DatabaseError),
}

impl ImportError {
    /// Whether the failure came from the target store losing its connection
    pub fn is_fatal(&self) -> bool {
        matches!(self, ImportError::Target(e) if e.is_fatal())
    }
}

/// Result type for import jobs
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type for row parsing
pub type RowResult<T> = Result<T, RowError>;
