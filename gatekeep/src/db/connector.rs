//! Pooled connection lifecycle for one backend.

use super::{
    config::{BackendKind, ConnectorConfig},
    errors::{DatabaseError, DatabaseResult},
};
use crate::runtime::Halt;
use parking_lot::RwLock;
use sqlx::{
    MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool,
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    pool::PoolConnection,
    postgres::{PgConnectOptions, PgPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

/// Backend-specific pool
#[derive(Clone)]
pub enum Pool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl Pool {
    async fn close(&self) {
        match self {
            Pool::MySql(pool) => pool.close().await,
            Pool::Postgres(pool) => pool.close().await,
            Pool::Sqlite(pool) => pool.close().await,
        }
    }
}

/// A single pooled connection, returned to the pool when dropped
pub enum Connection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

impl Connection {
    pub fn kind(&self) -> BackendKind {
        match self {
            Connection::MySql(_) => BackendKind::MySql,
            Connection::Postgres(_) => BackendKind::Postgres,
            Connection::Sqlite(_) => BackendKind::Sqlite,
        }
    }
}

/// Expand `$body` once per backend with `$c` bound to the raw connection
/// (`&mut DB::Connection`).
macro_rules! with_connection {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            $crate::db::connector::Connection::MySql(pooled) => {
                let $c = &mut **pooled;
                $body
            }
            $crate::db::connector::Connection::Postgres(pooled) => {
                let $c = &mut **pooled;
                $body
            }
            $crate::db::connector::Connection::Sqlite(pooled) => {
                let $c = &mut **pooled;
                $body
            }
        }
    };
}

pub(crate) use with_connection;

/// Owns the pool of one configured backend.
///
/// Storage loss after a successful `connect()` raises the shared [`Halt`]
/// signal: the host shuts down rather than keep serving on a store it can no
/// longer trust.
pub struct Connector {
    config: ConnectorConfig,
    pool: RwLock<Option<Pool>>,
    halt: Halt,
}

impl Connector {
    pub fn new(config: ConnectorConfig, halt: Halt) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
            halt,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.pool.read().is_some()
    }

    /// Open the pool
    ///
    /// Calling it on an already connected connector is a no-op.
    ///
    /// # Errors
    ///
    /// * `DatabaseError::Connection` - Bad credentials, unreachable host, unopenable file
    pub async fn connect(&self) -> DatabaseResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let config = &self.config;
        let kind = config.kind;
        let to_error = |source| DatabaseError::Connection {
            backend: kind,
            source,
        };

        let pool = match kind {
            BackendKind::MySql => {
                let options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.user)
                    .password(&config.password)
                    .database(&config.database);

                Pool::MySql(
                    MySqlPoolOptions::new()
                        .max_connections(config.max_connections)
                        .max_lifetime(config.max_lifetime())
                        .connect_with(options)
                        .await
                        .map_err(to_error)?,
                )
            }
            BackendKind::Postgres => {
                let options = PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.user)
                    .password(&config.password)
                    .database(&config.database);

                Pool::Postgres(
                    PgPoolOptions::new()
                        .max_connections(config.max_connections)
                        .max_lifetime(config.max_lifetime())
                        .connect_with(options)
                        .await
                        .map_err(to_error)?,
                )
            }
            BackendKind::Sqlite => {
                let options = SqliteConnectOptions::new()
                    .filename(&config.path)
                    .create_if_missing(true);

                Pool::Sqlite(
                    SqlitePoolOptions::new()
                        .max_connections(config.max_connections)
                        .max_lifetime(config.max_lifetime())
                        .connect_with(options)
                        .await
                        .map_err(to_error)?,
                )
            }
        };

        log::info!("Connected to {} database", kind);
        *self.pool.write() = Some(pool);
        Ok(())
    }

    /// Close the pool. Safe to call any number of times.
    pub async fn disconnect(&self) {
        let pool = self.pool.write().take();
        if let Some(pool) = pool {
            pool.close().await;
            log::info!("Disconnected from {} database", self.config.kind);
        }
    }

    /// Check out one connection for a single unit of work
    ///
    /// # Errors
    ///
    /// * `DatabaseError::Disconnected` - Not connected
    /// * `DatabaseError::Transient` - The pool could not hand out a connection
    pub async fn acquire(&self) -> DatabaseResult<Connection> {
        let pool = self.pool.read().clone().ok_or(DatabaseError::Disconnected)?;

        let connection = match pool {
            Pool::MySql(pool) => pool.acquire().await.map(Connection::MySql),
            Pool::Postgres(pool) => pool.acquire().await.map(Connection::Postgres),
            Pool::Sqlite(pool) => pool.acquire().await.map(Connection::Sqlite),
        };

        connection.map_err(|e| self.classify(e))
    }

    /// Round trip a trivial query
    pub async fn health_check(&self) -> DatabaseResult<()> {
        let mut conn = self.acquire().await?;
        with_connection!(&mut conn, c => sqlx::query("SELECT 1").execute(c).await.map(|_| ()))
            .map_err(|e| self.classify(e))
    }

    /// Map a driver error, raising the halt signal on connection loss
    pub fn classify(&self, err: sqlx::Error) -> DatabaseError {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                log::error!("Lost connection to {} database: {}", self.config.kind, err);
                self.halt
                    .raise(format!("{} storage connection lost", self.config.kind));
                DatabaseError::Transient(err)
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DatabaseError::Conflict(db.message().to_string())
            }
            other => DatabaseError::Query(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_connect_and_disconnect() {
        let dir = tempdir().unwrap();
        let connector = Connector::new(ConnectorConfig::sqlite(dir.path().join("c.db")), Halt::new());

        assert!(matches!(connector.acquire().await, Err(DatabaseError::Disconnected)));

        connector.connect().await.unwrap();
        connector.connect().await.unwrap();
        assert!(connector.is_connected());
        connector.health_check().await.unwrap();

        connector.disconnect().await;
        connector.disconnect().await;
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn test_connection_released_on_drop() {
        let dir = tempdir().unwrap();
        let mut config = ConnectorConfig::sqlite(dir.path().join("c.db"));
        config.max_connections = 1;
        let connector = Connector::new(config, Halt::new());
        connector.connect().await.unwrap();

        {
            let conn = connector.acquire().await.unwrap();
            assert_eq!(conn.kind(), BackendKind::Sqlite);
        }

        // Single slot is free again
        connector.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_unopenable_sqlite_path_fails() {
        let dir = tempdir().unwrap();
        let connector = Connector::new(
            ConnectorConfig::sqlite(dir.path().join("missing").join("c.db")),
            Halt::new(),
        );

        let result = connector.connect().await;
        assert!(matches!(result, Err(DatabaseError::Connection { .. })));
    }

    #[test]
    fn test_transient_error_raises_halt() {
        let halt = Halt::new();
        let connector = Connector::new(ConnectorConfig::sqlite("unused.db"), halt.clone());

        let err = connector.classify(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::Transient(_)));
        assert!(err.is_fatal());
        assert!(halt.is_raised());
    }

    #[test]
    fn test_query_error_does_not_halt() {
        let halt = Halt::new();
        let connector = Connector::new(ConnectorConfig::sqlite("unused.db"), halt.clone());

        let err = connector.classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
        assert!(!halt.is_raised());
    }
}
