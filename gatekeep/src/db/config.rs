//! Connector configuration.

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

/// Supported SQL backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    MySql,
    Postgres,
    Sqlite,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::MySql, BackendKind::Postgres, BackendKind::Sqlite];

    /// Connector name used in store ids and configuration keys
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::MySql => "mysql",
            BackendKind::Postgres => "postgresql",
            BackendKind::Sqlite => "sqlite",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            BackendKind::MySql => 3306,
            BackendKind::Postgres => 5432,
            BackendKind::Sqlite => 0,
        }
    }

    fn default_user(&self) -> &'static str {
        match self {
            BackendKind::MySql => "root",
            BackendKind::Postgres => "postgres",
            BackendKind::Sqlite => "",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(BackendKind::MySql),
            "postgresql" | "postgres" => Ok(BackendKind::Postgres),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Pool configuration for one backend
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub kind: BackendKind,

    pub host: String,

    pub port: u16,

    pub user: String,

    pub password: String,

    /// Database (schema) name; unused by SQLite
    pub database: String,

    /// Maximum lifetime of a pooled connection in seconds
    pub max_life_time_secs: u64,

    /// Database file, SQLite only
    pub path: PathBuf,

    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl ConnectorConfig {
    /// Defaults for a backend
    ///
    /// # Arguments
    ///
    /// * `kind` - Backend the pool connects to
    ///
    /// # Returns
    ///
    /// * `ConnectorConfig` - localhost, default port and user, database `gatekeep`
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            host: "localhost".to_string(),
            port: kind.default_port(),
            user: kind.default_user().to_string(),
            password: String::new(),
            database: "gatekeep".to_string(),
            max_life_time_secs: 600,
            path: PathBuf::from("gatekeep.db"),
            max_connections: 10,
        }
    }

    /// SQLite configuration for a database file
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::new(BackendKind::Sqlite)
        }
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_life_time_secs)
    }
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_life_time_secs", &self.max_life_time_secs)
            .field("path", &self.path)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}
