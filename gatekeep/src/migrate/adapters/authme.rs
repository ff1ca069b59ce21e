//! AuthMe `authme` table.

use super::{ARGON2ID, bcrypt_verbatim, imported};
use crate::{
    crypto::HashedPassword,
    db::BackendKind,
    identity::{Identity, offline_id},
    migrate::{
        adapter::FormatAdapter,
        errors::{RowError, RowResult},
        models::{ColumnKind, ColumnDef, LegacyRow},
    },
};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("realname", ColumnKind::Text),
    ColumnDef::required("password", ColumnKind::Text),
    ColumnDef::optional("lastlogin", ColumnKind::Integer),
    ColumnDef::optional("regdate", ColumnKind::Integer),
    ColumnDef::optional("ip", ColumnKind::Text),
    ColumnDef::optional("email", ColumnKind::Text),
    ColumnDef::optional("totp", ColumnKind::Text),
];

/// AuthMe keeps no stable id, so ids are derived from the real name.
pub struct AuthMeAdapter;

/// `$SHA$<salt>$<hash>`, bcrypt or argon2id
fn parse_password(raw: &str) -> RowResult<HashedPassword> {
    if let Some(rest) = raw.strip_prefix("$SHA$") {
        return match rest.split_once('$') {
            Some((salt, hash)) if !salt.is_empty() && !hash.is_empty() && !hash.contains('$') => {
                Ok(HashedPassword::new(hash, Some(salt.to_string()), "SHA-256"))
            }
            _ => Err(RowError::CredentialFormat("malformed $SHA$ hash".to_string())),
        };
    }

    if let Some(bcrypt) = bcrypt_verbatim(raw) {
        return Ok(bcrypt);
    }

    if raw.starts_with("$argon2id$") {
        return Ok(HashedPassword::new(raw, None, ARGON2ID));
    }

    Err(RowError::CredentialFormat(
        raw.split('$').nth(1).unwrap_or_default().to_string(),
    ))
}

impl FormatAdapter for AuthMeAdapter {
    fn id(&self) -> &'static str {
        "authme"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql, BackendKind::Postgres, BackendKind::Sqlite]
    }

    fn default_table(&self) -> Option<&'static str> {
        Some("authme")
    }

    fn name_column(&self) -> &'static str {
        "realname"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let name = row.require_text("realname")?;

        let mut identity = imported(offline_id(name), name);
        identity.credential = row.text("password").map(parse_password).transpose()?;
        identity.join_date = row.epoch_millis("regdate");
        identity.last_seen = row.epoch_millis("lastlogin");
        identity.ip = row.text("ip").map(str::to_string);
        identity.email = row.text("email").map(str::to_string);
        identity.secret = row.text("totp").map(str::to_string);

        Ok(identity)
    }
}
