//! Typed descriptors for every configuration key.

use super::{
    errors::{ConfigError, ConfigResult},
    source::ConfigSource,
};
use crate::db::{BackendKind, ConnectorConfig};
use std::{fmt, path::PathBuf};

/// Value kinds a key can hold. Defaults are `'static` so descriptors can be
/// `const`; reading produces the owned form.
pub trait KeyType: Copy + fmt::Display + 'static {
    type Owned;

    fn parse(raw: &str) -> Result<Self::Owned, String>;

    fn owned(self) -> Self::Owned;
}

impl KeyType for &'static str {
    type Owned = String;

    fn parse(raw: &str) -> Result<String, String> {
        Ok(raw.to_string())
    }

    fn owned(self) -> String {
        self.to_string()
    }
}

impl KeyType for bool {
    type Owned = bool;

    fn parse(raw: &str) -> Result<bool, String> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(format!("expected a boolean, got '{other}'")),
        }
    }

    fn owned(self) -> bool {
        self
    }
}

macro_rules! numeric_key_type {
    ($($ty:ty),*) => {
        $(
            impl KeyType for $ty {
                type Owned = $ty;

                fn parse(raw: &str) -> Result<$ty, String> {
                    raw.parse::<$ty>()
                        .map_err(|e| format!("expected {}, got '{raw}': {e}", stringify!($ty)))
                }

                fn owned(self) -> $ty {
                    self
                }
            }
        )*
    };
}

numeric_key_type!(i64, u32, u64);

/// One configuration key: dotted name, default and a line of documentation
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T: KeyType> {
    pub name: &'static str,
    pub default: T,
    pub description: &'static str,
}

impl<T: KeyType> ConfigKey<T> {
    pub const fn new(name: &'static str, default: T, description: &'static str) -> Self {
        Self {
            name,
            default,
            description,
        }
    }

    /// Value from `source`, or the default when the key is absent
    ///
    /// # Errors
    ///
    /// * `ConfigError::Invalid` - The value does not parse as `T`
    pub fn read(&self, source: &dyn ConfigSource) -> ConfigResult<T::Owned> {
        match source.get(self.name) {
            Some(raw) => T::parse(raw.trim()).map_err(|reason| ConfigError::Invalid {
                key: self.name.to_string(),
                reason,
            }),
            None => Ok(self.default.owned()),
        }
    }

    pub fn describe(&self) -> KeyDescription {
        KeyDescription {
            name: self.name.to_string(),
            default: self.default.to_string(),
            description: self.description,
        }
    }
}

/// Rendered descriptor, for `--keys` style listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescription {
    pub name: String,
    pub default: String,
    pub description: &'static str,
}

impl fmt::Display for KeyDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [default: {}]\n    {}", self.name, self.default, self.description)
    }
}

pub const DATABASE_TYPE: ConfigKey<&str> = ConfigKey::new(
    "database.type",
    "gatekeep-sqlite",
    "Identity store: gatekeep-mysql, gatekeep-postgresql or gatekeep-sqlite",
);

pub const MIGRATION_ENABLED: ConfigKey<bool> = ConfigKey::new(
    "migration.enabled",
    false,
    "Import identities from another product on the next startup",
);

pub const MIGRATION_TYPE: ConfigKey<&str> = ConfigKey::new(
    "migration.type",
    "authme-sqlite",
    "Importer id, <product>-<backend>",
);

pub const MIGRATION_OLD_TABLE_NAME: ConfigKey<&str> = ConfigKey::new(
    "migration.old-table-name",
    "",
    "Legacy table to read; empty uses the importer's default table",
);

pub const CRYPTO_DEFAULT_PROVIDER: ConfigKey<&str> = ConfigKey::new(
    "crypto.default-provider",
    "BCrypt-2A",
    "Algorithm for new hashes: BCrypt-2A, Argon2ID, SHA-256 or SHA-512",
);

pub const CRYPTO_BCRYPT_COST: ConfigKey<u32> = ConfigKey::new(
    "crypto.bcrypt-cost",
    10,
    "BCrypt work factor, 4 to 31",
);

pub const PASSWORD_MIN_LENGTH: ConfigKey<u32> = ConfigKey::new(
    "password.min-length",
    4,
    "Shortest password accepted on register and change",
);

pub const PASSWORD_FORBIDDEN: ConfigKey<&str> = ConfigKey::new(
    "password.forbidden",
    "",
    "Comma-separated passwords refused on register and change, any case",
);

pub const IDENTITY_NEW_ID_CREATOR: ConfigKey<&str> = ConfigKey::new(
    "identity.new-id-creator",
    "cracked",
    "Id for new identities: cracked (offline id), mojang (premium id when confirmed) or random",
);

pub const PASSWORD_MAX_ATTEMPTS: ConfigKey<i64> = ConfigKey::new(
    "password.max-attempts",
    -1,
    "Wrong passwords allowed per connection before it is dropped; -1 disables",
);

pub const TOTP_ENABLED: ConfigKey<bool> = ConfigKey::new(
    "totp.enabled",
    true,
    "Allow players to configure a second factor",
);

pub const TOTP_MAX_ATTEMPTS: ConfigKey<u32> = ConfigKey::new(
    "totp.max-attempts",
    3,
    "Wrong one-time codes allowed before the challenge is dropped",
);

pub const REMEMBER_LAST_SERVER: ConfigKey<bool> = ConfigKey::new(
    "remember-last-server",
    false,
    "Persist the server a player leaves from",
);

pub const LIMBO: ConfigKey<&str> = ConfigKey::new(
    "limbo",
    "limbo",
    "Comma-separated servers never remembered as a last server",
);

pub const RATE_LIMIT_EMAIL_WINDOW_SECS: ConfigKey<u64> = ConfigKey::new(
    "rate-limit.email-window-secs",
    300,
    "Window for outbound e-mail requests per identity",
);

pub const RATE_LIMIT_EMAIL_LIMIT: ConfigKey<u32> = ConfigKey::new(
    "rate-limit.email-limit",
    1,
    "Outbound e-mail requests allowed per window",
);

pub const PREMIUM_CONFIRM_WINDOW_SECS: ConfigKey<u64> = ConfigKey::new(
    "premium.confirm-window-secs",
    300,
    "How long an enable-premium request waits for confirmation",
);

pub const PASSWORD_RESET_TOKEN_TTL_SECS: ConfigKey<u64> = ConfigKey::new(
    "password-reset.token-ttl-secs",
    600,
    "Lifetime of a password reset token",
);

pub const AUTH_LOGIN_TIMEOUT_SECS: ConfigKey<u64> = ConfigKey::new(
    "auth.login-timeout-secs",
    0,
    "Disconnect connections still unauthenticated after this long; 0 disables",
);

pub const WORKERS_MAX_BLOCKING: ConfigKey<u32> = ConfigKey::new(
    "workers.max-blocking",
    4,
    "Hashing jobs allowed to run at once",
);

/// Prefix of the identity store's connector keys
pub const DATABASE_PROPERTIES: &str = "database.properties";

/// Prefix of the migration source's connector keys
pub const MIGRATION_OLD_DATABASE: &str = "migration.old-database";

/// Per-connector key suffixes, read under `<prefix>.<connector>.`
pub const CONNECTOR_FIELDS: [(&str, &str); 8] = [
    ("host", "Database host"),
    ("port", "Database port"),
    ("user", "Database user"),
    ("password", "Database password"),
    ("database", "Database (schema) name"),
    ("max-life-time", "Maximum lifetime of a pooled connection, seconds"),
    ("max-connections", "Maximum pooled connections"),
    ("path", "SQLite database file, relative to the data directory"),
];

/// Every fixed key name, for documentation
pub const ALL: [&str; 20] = [
    DATABASE_TYPE.name,
    MIGRATION_ENABLED.name,
    MIGRATION_TYPE.name,
    MIGRATION_OLD_TABLE_NAME.name,
    CRYPTO_DEFAULT_PROVIDER.name,
    CRYPTO_BCRYPT_COST.name,
    PASSWORD_MIN_LENGTH.name,
    PASSWORD_FORBIDDEN.name,
    IDENTITY_NEW_ID_CREATOR.name,
    PASSWORD_MAX_ATTEMPTS.name,
    TOTP_ENABLED.name,
    TOTP_MAX_ATTEMPTS.name,
    REMEMBER_LAST_SERVER.name,
    LIMBO.name,
    RATE_LIMIT_EMAIL_WINDOW_SECS.name,
    RATE_LIMIT_EMAIL_LIMIT.name,
    PREMIUM_CONFIRM_WINDOW_SECS.name,
    PASSWORD_RESET_TOKEN_TTL_SECS.name,
    AUTH_LOGIN_TIMEOUT_SECS.name,
    WORKERS_MAX_BLOCKING.name,
];

/// Rendered descriptors for every key, connector templates included
pub fn describe_all() -> Vec<KeyDescription> {
    let mut keys = vec![
        DATABASE_TYPE.describe(),
        MIGRATION_ENABLED.describe(),
        MIGRATION_TYPE.describe(),
        MIGRATION_OLD_TABLE_NAME.describe(),
        CRYPTO_DEFAULT_PROVIDER.describe(),
        CRYPTO_BCRYPT_COST.describe(),
        PASSWORD_MIN_LENGTH.describe(),
        PASSWORD_FORBIDDEN.describe(),
        IDENTITY_NEW_ID_CREATOR.describe(),
        PASSWORD_MAX_ATTEMPTS.describe(),
        TOTP_ENABLED.describe(),
        TOTP_MAX_ATTEMPTS.describe(),
        REMEMBER_LAST_SERVER.describe(),
        LIMBO.describe(),
        RATE_LIMIT_EMAIL_WINDOW_SECS.describe(),
        RATE_LIMIT_EMAIL_LIMIT.describe(),
        PREMIUM_CONFIRM_WINDOW_SECS.describe(),
        PASSWORD_RESET_TOKEN_TTL_SECS.describe(),
        AUTH_LOGIN_TIMEOUT_SECS.describe(),
        WORKERS_MAX_BLOCKING.describe(),
    ];

    for prefix in [DATABASE_PROPERTIES, MIGRATION_OLD_DATABASE] {
        for (field, description) in CONNECTOR_FIELDS {
            keys.push(KeyDescription {
                name: format!("{prefix}.<connector>.{field}"),
                default: "per connector".to_string(),
                description,
            });
        }
    }

    keys
}

/// Connector settings for `kind` under `prefix`
///
/// # Arguments
///
/// * `source` - Where values are read from
/// * `prefix` - [`DATABASE_PROPERTIES`] or [`MIGRATION_OLD_DATABASE`]
/// * `kind` - Backend whose section is read; absent keys keep its defaults
///
/// # Errors
///
/// * `ConfigError::Invalid` - A numeric field does not parse
pub fn read_connector(
    source: &dyn ConfigSource,
    prefix: &str,
    kind: BackendKind,
) -> ConfigResult<ConnectorConfig> {
    let mut config = ConnectorConfig::new(kind);
    let key = |field: &str| format!("{prefix}.{}.{field}", kind.as_str());

    if let Some(host) = source.get(&key("host")) {
        config.host = host;
    }
    if let Some(port) = parse_field(source, &key("port"))? {
        config.port = port;
    }
    if let Some(user) = source.get(&key("user")) {
        config.user = user;
    }
    if let Some(password) = source.get(&key("password")) {
        config.password = password;
    }
    if let Some(database) = source.get(&key("database")) {
        config.database = database;
    }
    if let Some(lifetime) = parse_field(source, &key("max-life-time"))? {
        config.max_life_time_secs = lifetime;
    }
    if let Some(max) = parse_field::<u32>(source, &key("max-connections"))? {
        if max == 0 {
            return Err(ConfigError::Invalid {
                key: key("max-connections"),
                reason: "must be at least 1".to_string(),
            });
        }
        config.max_connections = max;
    }
    if let Some(path) = source.get(&key("path")) {
        config.path = PathBuf::from(path);
    }

    Ok(config)
}

fn parse_field<T>(source: &dyn ConfigSource, key: &str) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    source
        .get(key)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
