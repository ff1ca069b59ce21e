//! Row mapping for the canonical identity table.

use super::errors::DatabaseError;
use crate::{crypto::HashedPassword, identity::Identity};
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

/// One canonical row as stored. Ids are kept as hyphenated text and
/// timestamps as naive UTC so every backend maps them the same way.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct IdentityRow {
    pub id: String,
    pub premium_id: Option<String>,
    pub password_hash: Option<String>,
    pub password_salt: Option<String>,
    pub password_algo: Option<String>,
    pub last_nickname: String,
    pub join_date: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub secret: Option<String>,
    pub ip: Option<String>,
    pub last_authentication: Option<NaiveDateTime>,
    pub last_server: Option<String>,
    pub email: Option<String>,
}

fn naive(ts: Option<DateTime<Utc>>) -> Option<NaiveDateTime> {
    ts.map(|t| t.naive_utc())
}

fn utc(ts: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    ts.map(|t| t.and_utc())
}

impl From<&Identity> for IdentityRow {
    fn from(identity: &Identity) -> Self {
        let credential = identity.credential.as_ref();
        Self {
            id: identity.id.hyphenated().to_string(),
            premium_id: identity.premium_id.map(|p| p.hyphenated().to_string()),
            password_hash: credential.map(|c| c.hash.clone()),
            password_salt: credential.and_then(|c| c.salt.clone()),
            password_algo: credential.map(|c| c.algorithm.clone()),
            last_nickname: identity.last_nickname.clone(),
            join_date: naive(identity.join_date),
            last_seen: naive(identity.last_seen),
            secret: identity.secret.clone(),
            ip: identity.ip.clone(),
            last_authentication: naive(identity.last_authentication),
            last_server: identity.last_server.clone(),
            email: identity.email.clone(),
        }
    }
}

impl TryFrom<IdentityRow> for Identity {
    type Error = DatabaseError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| DatabaseError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(format!("id: {e}")))?;
        let premium_id = row
            .premium_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| corrupt(format!("premium_id: {e}")))?;

        let credential = match (row.password_hash, row.password_algo) {
            (Some(hash), Some(algorithm)) => Some(HashedPassword::new(hash, row.password_salt, algorithm)),
            _ => None,
        };

        Ok(Identity {
            id,
            premium_id,
            credential,
            last_nickname: row.last_nickname,
            join_date: utc(row.join_date),
            last_seen: utc(row.last_seen),
            secret: row.secret,
            ip: row.ip,
            last_authentication: utc(row.last_authentication),
            last_server: row.last_server,
            email: row.email,
        })
    }
}
