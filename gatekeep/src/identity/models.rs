//! Canonical identity data model.

use crate::crypto::HashedPassword;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Identity ID type
pub type IdentityId = Uuid;

/// One player's authentication facts.
///
/// Equality and hashing only consider [`Identity::id`], so a set of
/// identities holds at most one entry per id regardless of the other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub premium_id: Option<Uuid>,
    pub credential: Option<HashedPassword>,
    pub last_nickname: String,
    pub join_date: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub secret: Option<String>,
    pub ip: Option<String>,
    pub last_authentication: Option<DateTime<Utc>>,
    pub last_server: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    /// Create an identity seen for the first time, without a credential.
    pub fn new(id: IdentityId, last_nickname: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            premium_id: None,
            credential: None,
            last_nickname: last_nickname.into(),
            join_date: Some(now),
            last_seen: Some(now),
            secret: None,
            ip: None,
            last_authentication: None,
            last_server: None,
            email: None,
        }
    }

    /// Whether a password has been set.
    pub fn is_registered(&self) -> bool {
        self.credential.is_some()
    }

    /// Whether the identity is bound to an externally verified premium identity.
    pub fn auto_login_enabled(&self) -> bool {
        self.premium_id.is_some()
    }

    /// Whether a second factor has been configured.
    pub fn two_factor_enabled(&self) -> bool {
        self.secret.is_some()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_identity_is_unregistered() {
        let identity = Identity::new(Uuid::new_v4(), "Alice");
        assert!(!identity.is_registered());
        assert!(!identity.auto_login_enabled());
        assert!(identity.join_date.is_some());
    }

    #[test]
    fn test_registration_follows_credential() {
        let mut identity = Identity::new(Uuid::new_v4(), "Alice");
        identity.credential = Some(HashedPassword::new("h", Some("s".to_string()), "SHA-256"));
        assert!(identity.is_registered());
    }

    #[test]
    fn test_set_deduplicates_by_id() {
        let id = Uuid::new_v4();
        let mut set = HashSet::new();
        set.insert(Identity::new(id, "Alice"));
        set.insert(Identity::new(id, "alice_renamed"));
        assert_eq!(set.len(), 1);
    }
}
