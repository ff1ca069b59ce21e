//! Startup configuration.
//!
//! Keys are declared once in [`keys`] as typed descriptors and read through a
//! [`ConfigSource`]. [`GatekeepConfig::load`] reads and validates all of them;
//! any error is fatal at startup.

pub mod errors;
pub mod keys;
pub mod source;

pub use errors::{ConfigError, ConfigResult};
pub use keys::{ConfigKey, KeyDescription, KeyType, describe_all};
pub use source::{ConfigSource, EnvSource, MapSource};

use crate::{
    auth::AuthSettings,
    crypto::{CryptoRegistry, CryptoResult},
    db::{BackendKind, ConnectorConfig, backend_for_store},
    identity::IdCreator,
    migrate::ImporterRegistry,
    security::RateLimitConfig,
};
use std::{path::Path, time::Duration};

/// Legacy import requested for this startup
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub importer_id: String,
    pub source: ConnectorConfig,
    /// Overrides the importer's default table
    pub table: Option<String>,
}

/// Everything the core needs to start
#[derive(Debug, Clone)]
pub struct GatekeepConfig {
    pub store_id: String,
    pub connector: ConnectorConfig,
    pub migration: Option<MigrationSettings>,
    pub crypto_default: String,
    pub bcrypt_cost: u32,
    pub auth: AuthSettings,
    pub max_blocking: usize,
}

impl GatekeepConfig {
    /// Read and validate every key
    ///
    /// # Errors
    ///
    /// * `ConfigError::UnknownStore` - `database.type` is not a registered store
    /// * `ConfigError::UnknownImporter` - Migration enabled with an unknown importer
    /// * `ConfigError::Invalid` - A value does not parse or is out of range
    pub fn load(source: &dyn ConfigSource) -> ConfigResult<Self> {
        let store_id = keys::DATABASE_TYPE.read(source)?.to_ascii_lowercase();
        let backend =
            backend_for_store(&store_id).ok_or_else(|| ConfigError::UnknownStore(store_id.clone()))?;
        let connector = keys::read_connector(source, keys::DATABASE_PROPERTIES, backend)?;

        let migration = if keys::MIGRATION_ENABLED.read(source)? {
            Some(Self::load_migration(source)?)
        } else {
            None
        };

        let crypto_default = keys::CRYPTO_DEFAULT_PROVIDER.read(source)?;
        let bcrypt_cost = keys::CRYPTO_BCRYPT_COST.read(source)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(invalid(&keys::CRYPTO_BCRYPT_COST, "must be between 4 and 31"));
        }
        CryptoRegistry::with_builtin_cost(&crypto_default, bcrypt_cost).map_err(|e| {
            ConfigError::Invalid {
                key: keys::CRYPTO_DEFAULT_PROVIDER.name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let max_blocking = keys::WORKERS_MAX_BLOCKING.read(source)?;
        if max_blocking == 0 {
            return Err(invalid(&keys::WORKERS_MAX_BLOCKING, "must be at least 1"));
        }

        Ok(Self {
            store_id,
            connector,
            migration,
            crypto_default,
            bcrypt_cost,
            auth: Self::load_auth(source)?,
            max_blocking: max_blocking as usize,
        })
    }

    fn load_migration(source: &dyn ConfigSource) -> ConfigResult<MigrationSettings> {
        let importer_id = keys::MIGRATION_TYPE.read(source)?.to_ascii_lowercase();
        let registry = ImporterRegistry::with_builtin();
        let importer = registry
            .get(&importer_id)
            .ok_or_else(|| ConfigError::UnknownImporter(importer_id.clone()))?;

        let table = keys::MIGRATION_OLD_TABLE_NAME.read(source)?;
        let table = (!table.trim().is_empty()).then(|| table.trim().to_string());

        Ok(MigrationSettings {
            source: keys::read_connector(source, keys::MIGRATION_OLD_DATABASE, importer.backend)?,
            importer_id,
            table,
        })
    }

    fn load_auth(source: &dyn ConfigSource) -> ConfigResult<AuthSettings> {
        let max_attempts = keys::PASSWORD_MAX_ATTEMPTS.read(source)?;
        let max_password_attempts = match max_attempts {
            -1 => None,
            n if n >= 1 => Some(u32::try_from(n).unwrap_or(u32::MAX)),
            _ => {
                return Err(invalid(
                    &keys::PASSWORD_MAX_ATTEMPTS,
                    "must be -1 (disabled) or at least 1",
                ));
            }
        };

        let totp_max_attempts = keys::TOTP_MAX_ATTEMPTS.read(source)?;
        if totp_max_attempts == 0 {
            return Err(invalid(&keys::TOTP_MAX_ATTEMPTS, "must be at least 1"));
        }

        let email_rate_limit = RateLimitConfig::new(
            keys::RATE_LIMIT_EMAIL_LIMIT.read(source)?,
            Duration::from_secs(keys::RATE_LIMIT_EMAIL_WINDOW_SECS.read(source)?),
        )
        .map_err(|e| ConfigError::Invalid {
            key: "rate-limit.email-*".to_string(),
            reason: e.to_string(),
        })?;

        let limbo = keys::LIMBO
            .read(source)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let forbidden_passwords = keys::PASSWORD_FORBIDDEN
            .read(source)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
            .collect();

        let id_creator = keys::IDENTITY_NEW_ID_CREATOR
            .read(source)?
            .parse::<IdCreator>()
            .map_err(|reason| ConfigError::Invalid {
                key: keys::IDENTITY_NEW_ID_CREATOR.name.to_string(),
                reason,
            })?;

        let login_timeout = match keys::AUTH_LOGIN_TIMEOUT_SECS.read(source)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(AuthSettings {
            min_password_length: keys::PASSWORD_MIN_LENGTH.read(source)? as usize,
            forbidden_passwords,
            id_creator,
            max_password_attempts,
            totp_enabled: keys::TOTP_ENABLED.read(source)?,
            totp_max_attempts,
            remember_last_server: keys::REMEMBER_LAST_SERVER.read(source)?,
            limbo,
            email_rate_limit,
            premium_confirm_window: Duration::from_secs(
                keys::PREMIUM_CONFIRM_WINDOW_SECS.read(source)?,
            ),
            reset_token_ttl: Duration::from_secs(keys::PASSWORD_RESET_TOKEN_TTL_SECS.read(source)?),
            login_timeout,
        })
    }

    pub fn backend(&self) -> BackendKind {
        self.connector.kind
    }

    /// Credential codec for the configured default algorithm
    ///
    /// # Errors
    ///
    /// * `CryptoError::UnknownProvider` / `CryptoError::LegacyOnly` - Bad default
    pub fn crypto_registry(&self) -> CryptoResult<CryptoRegistry> {
        CryptoRegistry::with_builtin_cost(&self.crypto_default, self.bcrypt_cost)
    }

    /// Anchor relative SQLite paths in the host's data directory
    pub fn resolve_paths(&mut self, data_dir: &Path) {
        anchor(&mut self.connector, data_dir);
        if let Some(migration) = self.migration.as_mut() {
            anchor(&mut migration.source, data_dir);
        }
    }
}

fn anchor(config: &mut ConnectorConfig, data_dir: &Path) {
    if config.kind == BackendKind::Sqlite && config.path.is_relative() {
        config.path = data_dir.join(&config.path);
    }
}

fn invalid<T: KeyType>(key: &ConfigKey<T>, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.name.to_string(),
        reason: reason.to_string(),
    }
}
