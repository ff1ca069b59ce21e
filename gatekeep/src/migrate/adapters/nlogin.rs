//! nLogin `nlogin` table.

use super::{bcrypt_verbatim, imported};
use crate::{
    crypto::HashedPassword,
    db::BackendKind,
    identity::Identity,
    migrate::{
        adapter::FormatAdapter,
        errors::{RowError, RowResult},
        models::{ColumnKind, ColumnDef, LegacyRow},
    },
};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("unique_id", ColumnKind::Text),
    ColumnDef::optional("mojang_id", ColumnKind::Text),
    ColumnDef::required("last_name", ColumnKind::Text),
    ColumnDef::optional("last_seen", ColumnKind::Timestamp),
    ColumnDef::optional("creation_date", ColumnKind::Timestamp),
    ColumnDef::required("password", ColumnKind::Text),
    ColumnDef::optional("last_ip", ColumnKind::Text),
];

/// nLogin writes `$SHA512$<hash>$<salt>`, hash before salt.
pub struct NLoginAdapter;

fn parse_password(raw: &str) -> RowResult<HashedPassword> {
    if let Some(rest) = raw.strip_prefix("$SHA512$") {
        return match rest.split_once('$') {
            Some((hash, salt)) if !hash.is_empty() => {
                Ok(HashedPassword::new(hash, Some(salt.to_string()), "SHA-512"))
            }
            _ => Err(RowError::CredentialFormat("malformed $SHA512$ hash".to_string())),
        };
    }

    bcrypt_verbatim(raw).ok_or_else(|| {
        RowError::CredentialFormat(raw.split('$').nth(1).unwrap_or_default().to_string())
    })
}

impl FormatAdapter for NLoginAdapter {
    fn id(&self) -> &'static str {
        "nlogin"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql, BackendKind::Sqlite]
    }

    fn default_table(&self) -> Option<&'static str> {
        Some("nlogin")
    }

    fn name_column(&self) -> &'static str {
        "last_name"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let name = row.require_text("last_name")?;
        let id = row.require_uuid("unique_id")?;

        let mut identity = imported(id, name);
        identity.premium_id = row.uuid("mojang_id")?;
        identity.credential = row.text("password").map(parse_password).transpose()?;
        identity.join_date = row.timestamp("creation_date");
        identity.last_seen = row.timestamp("last_seen");
        identity.ip = row.text("last_ip").map(str::to_string);

        Ok(identity)
    }
}
