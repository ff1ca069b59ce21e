//! Where configuration values come from.

use std::collections::HashMap;

/// Raw string lookup by dotted key
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment, `GATEKEEP_` prefixed upper-snake names.
///
/// `database.properties.mysql.host` is read from
/// `GATEKEEP_DATABASE_PROPERTIES_MYSQL_HOST`.
#[derive(Debug, Clone, Default)]
pub struct EnvSource;

impl EnvSource {
    pub const PREFIX: &'static str = "GATEKEEP_";

    pub fn var_name(key: &str) -> String {
        let mut name = String::with_capacity(Self::PREFIX.len() + key.len());
        name.push_str(Self::PREFIX);
        name.extend(key.chars().map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        }));
        name
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(Self::var_name(key)).ok()
    }
}

/// In-memory values keyed by the dotted key
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
