//! Server configuration management.
//!
//! Wraps the core configuration with the few settings only the standalone
//! host needs.

use gatekeep::config::{ConfigKey, ConfigSource, GatekeepConfig};
use std::{path::PathBuf, time::Duration};

pub const DATA_DIR: ConfigKey<&str> = ConfigKey::new(
    "server.data-dir",
    "data",
    "Directory holding SQLite databases; relative paths are anchored here",
);

pub const SHUTDOWN_GRACE_SECS: ConfigKey<u64> = ConfigKey::new(
    "server.shutdown-grace-secs",
    5,
    "Seconds to wait before exiting after storage is lost",
);

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    /// Delay between a fatal storage error and process exit
    pub shutdown_grace: Duration,
    pub core: GatekeepConfig,
}

impl ServerConfig {
    /// Load configuration from `source`
    ///
    /// # Arguments
    ///
    /// * `source` - Key/value source, normally the process environment
    /// * `data_dir_override` - Optional data directory override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a core key is missing or invalid
    pub fn load(
        source: &dyn ConfigSource,
        data_dir_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let data_dir = match data_dir_override {
            Some(dir) => dir,
            None => PathBuf::from(DATA_DIR.read(source)?),
        };
        if data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: DATA_DIR.name.to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        let mut core = GatekeepConfig::load(source)?;
        core.resolve_paths(&data_dir);

        Ok(ServerConfig {
            data_dir,
            shutdown_grace: Duration::from_secs(SHUTDOWN_GRACE_SECS.read(source)?),
            core,
        })
    }

    /// Key listing printed by `--keys`
    pub fn describe() -> String {
        let mut out = String::new();
        let server_keys = [DATA_DIR.describe(), SHUTDOWN_GRACE_SECS.describe()];
        for key in server_keys.into_iter().chain(gatekeep::config::describe_all()) {
            out.push_str(&key.to_string());
            out.push('\n');
        }
        out
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Core(#[from] gatekeep::ConfigError),

    #[error("Invalid configuration for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
