//! Configuration error types.

use thiserror::Error;

/// Configuration errors, all fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration key: {key}\nHint: {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration for {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// `database.type` names no registered store
    #[error("Unknown database type '{0}'")]
    UnknownStore(String),

    /// `migration.type` names no registered importer
    #[error("Unknown migration type '{0}'")]
    UnknownImporter(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
