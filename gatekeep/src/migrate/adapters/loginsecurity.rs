//! LoginSecurity `ls_players` table.

use super::{bcrypt_verbatim, imported};
use crate::{
    db::BackendKind,
    identity::Identity,
    migrate::{
        adapter::FormatAdapter,
        errors::{RowError, RowResult},
        models::{ColumnKind, ColumnDef, LegacyRow},
    },
};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("unique_user_id", ColumnKind::Text),
    ColumnDef::required("last_name", ColumnKind::Text),
    ColumnDef::required("password", ColumnKind::Text),
    ColumnDef::optional("ip_address", ColumnKind::Text),
    ColumnDef::optional("last_login", ColumnKind::Timestamp),
    ColumnDef::optional("registration_date", ColumnKind::Timestamp),
];

pub struct LoginSecurityAdapter;

impl FormatAdapter for LoginSecurityAdapter {
    fn id(&self) -> &'static str {
        "loginsecurity"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql, BackendKind::Sqlite]
    }

    fn default_table(&self) -> Option<&'static str> {
        Some("ls_players")
    }

    fn name_column(&self) -> &'static str {
        "last_name"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let name = row.require_text("last_name")?;
        let id = row.require_uuid("unique_user_id")?;

        let mut identity = imported(id, name);
        identity.credential = row
            .text("password")
            .map(|raw| {
                bcrypt_verbatim(raw).ok_or_else(|| RowError::CredentialFormat("non-bcrypt password".to_string()))
            })
            .transpose()?;
        identity.ip = row.text("ip_address").map(str::to_string);
        identity.join_date = row.timestamp("registration_date");
        identity.last_seen = row.timestamp("last_login");

        Ok(identity)
    }
}
