//! Canonical identity record and deterministic id derivation.

pub mod models;

pub use models::{Identity, IdentityId};

use md5::{Digest, Md5};
use std::{fmt, str::FromStr};
use uuid::{Builder, Uuid};

/// Namespace prefixed to display names when deriving offline ids.
pub const OFFLINE_NAMESPACE: &str = "OfflinePlayer:";

/// Derive the id of an identity that has no platform-issued id.
///
/// The id is a name-based (version 3) UUID over `OfflinePlayer:<name>`, which
/// matches what game hosts assign to offline-mode players. The same name
/// always yields the same id.
pub fn offline_id(name: &str) -> Uuid {
    derive_id(OFFLINE_NAMESPACE, name)
}

/// Derive a name-based id from an arbitrary namespace string and a name.
pub fn derive_id(namespace: &str, name: &str) -> Uuid {
    let mut hasher = Md5::new();
    hasher.update(namespace.as_bytes());
    hasher.update(name.as_bytes());
    let digest: [u8; 16] = hasher.finalize().into();
    Builder::from_md5_bytes(digest).into_uuid()
}

/// Parse an id stored either dashed or as 32 bare hex digits.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// How the id of a newly created identity is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdCreator {
    /// Fresh random (version 4) id
    Random,
    /// The host-confirmed premium id when there is one, else the offline id
    Mojang,
    /// Offline id derived from the display name
    #[default]
    Cracked,
}

impl IdCreator {
    /// Id for a new identity named `name`
    ///
    /// # Arguments
    ///
    /// * `name` - Display name the identity is created for
    /// * `premium_id` - Premium id the host confirmed for this connection
    pub fn new_id(self, name: &str, premium_id: Option<Uuid>) -> Uuid {
        match self {
            IdCreator::Random => Uuid::new_v4(),
            IdCreator::Mojang => premium_id.unwrap_or_else(|| offline_id(name)),
            IdCreator::Cracked => offline_id(name),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdCreator::Random => "random",
            IdCreator::Mojang => "mojang",
            IdCreator::Cracked => "cracked",
        }
    }
}

impl fmt::Display for IdCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdCreator {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(IdCreator::Random),
            "mojang" => Ok(IdCreator::Mojang),
            "cracked" => Ok(IdCreator::Cracked),
            other => Err(format!("expected random, mojang or cracked, got '{other}'")),
        }
    }
}
