//! LogIt accounts table.

use super::imported;
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
    ColumnDef::required("uuid", ColumnKind::Text),
    ColumnDef::required("last_active_name", ColumnKind::Text),
    ColumnDef::required("password", ColumnKind::Text),
    ColumnDef::optional("salt", ColumnKind::Text),
    ColumnDef::required("hashing_algorithm", ColumnKind::Text),
    ColumnDef::optional("ip", ColumnKind::Text),
    ColumnDef::optional("email", ColumnKind::Text),
    ColumnDef::optional("last_active_date", ColumnKind::Integer),
    ColumnDef::optional("reg_date", ColumnKind::Integer),
];

/// LogIt names the digest per row; only its salted SHA-256 layout is
/// importable, as the verify-only `LOGIT-SHA-256` algorithm.
pub struct LogItAdapter;

impl FormatAdapter for LogItAdapter {
    fn id(&self) -> &'static str {
        "logit"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql]
    }

    fn name_column(&self) -> &'static str {
        "last_active_name"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let name = row.require_text("last_active_name")?;
        let id = row.require_uuid("uuid")?;

        let mut identity = imported(id, name);
        if let Some(hash) = row.text("password") {
            let algorithm = row.text("hashing_algorithm").unwrap_or_default();
            if !algorithm.eq_ignore_ascii_case("sha-256") {
                return Err(RowError::CredentialFormat(algorithm.to_string()));
            }
            identity.credential = Some(HashedPassword::new(
                hash,
                row.text("salt").map(str::to_string),
                "LOGIT-SHA-256",
            ));
        }
        identity.ip = row.text("ip").map(str::to_string);
        identity.email = row.text("email").map(str::to_string);
        identity.join_date = row.epoch_secs("reg_date");
        identity.last_seen = row.epoch_secs("last_active_date");

        Ok(identity)
    }
}
