//! Canonical table of another gatekeep backend.

use super::imported;
use crate::{
    crypto::HashedPassword,
    db::{BackendKind, IDENTITY_TABLE},
    identity::Identity,
    migrate::{
        adapter::FormatAdapter,
        errors::RowResult,
        models::{ColumnKind, ColumnDef, LegacyRow},
    },
};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("id", ColumnKind::Text),
    ColumnDef::required("premium_id", ColumnKind::Text),
    ColumnDef::required("password_hash", ColumnKind::Text),
    ColumnDef::required("password_salt", ColumnKind::Text),
    ColumnDef::required("password_algo", ColumnKind::Text),
    ColumnDef::required("last_nickname", ColumnKind::Text),
    ColumnDef::required("join_date", ColumnKind::Timestamp),
    ColumnDef::required("last_seen", ColumnKind::Timestamp),
    ColumnDef::required("secret", ColumnKind::Text),
    ColumnDef::required("ip", ColumnKind::Text),
    ColumnDef::required("last_authentication", ColumnKind::Timestamp),
    ColumnDef::required("last_server", ColumnKind::Text),
    ColumnDef::required("email", ColumnKind::Text),
];

/// Moves identities between backends, e.g. SQLite to PostgreSQL.
pub struct CanonicalAdapter;

impl FormatAdapter for CanonicalAdapter {
    fn id(&self) -> &'static str {
        "gatekeep"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql, BackendKind::Postgres, BackendKind::Sqlite]
    }

    fn default_table(&self) -> Option<&'static str> {
        Some(IDENTITY_TABLE)
    }

    fn name_column(&self) -> &'static str {
        "last_nickname"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let name = row.require_text("last_nickname")?;
        let id = row.require_uuid("id")?;

        let mut identity = imported(id, name);
        identity.premium_id = row.uuid("premium_id")?;
        identity.credential = match (row.text("password_hash"), row.text("password_algo")) {
            (Some(hash), Some(algorithm)) => Some(HashedPassword::new(
                hash,
                row.text("password_salt").map(str::to_string),
                algorithm,
            )),
            _ => None,
        };
        identity.join_date = row.timestamp("join_date");
        identity.last_seen = row.timestamp("last_seen");
        identity.secret = row.text("secret").map(str::to_string);
        identity.ip = row.text("ip").map(str::to_string);
        identity.last_authentication = row.timestamp("last_authentication");
        identity.last_server = row.text("last_server").map(str::to_string);
        identity.email = row.text("email").map(str::to_string);

        Ok(identity)
    }
}
