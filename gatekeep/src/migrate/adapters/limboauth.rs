//! LimboAuth `AUTH` table.

use super::{bcrypt_verbatim, imported};
use crate::{
    db::BackendKind,
    identity::{Identity, offline_id},
    migrate::{
        adapter::FormatAdapter,
        errors::{RowError, RowResult},
        models::{ColumnKind, ColumnDef, LegacyRow},
    },
};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("NICKNAME", ColumnKind::Text),
    ColumnDef::required("HASH", ColumnKind::Text),
    ColumnDef::optional("IP", ColumnKind::Text),
    ColumnDef::optional("TOTPTOKEN", ColumnKind::Text),
    ColumnDef::optional("REGDATE", ColumnKind::Integer),
    ColumnDef::optional("UUID", ColumnKind::Text),
    ColumnDef::optional("PREMIUMUUID", ColumnKind::Text),
    ColumnDef::optional("LOGINDATE", ColumnKind::Integer),
];

/// LimboAuth stores bcrypt hashes and epoch-millisecond dates. Rows written
/// before it tracked ids fall back to the offline id of the nickname.
pub struct LimboAuthAdapter;

impl FormatAdapter for LimboAuthAdapter {
    fn id(&self) -> &'static str {
        "limboauth"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql]
    }

    fn default_table(&self) -> Option<&'static str> {
        Some("AUTH")
    }

    fn name_column(&self) -> &'static str {
        "NICKNAME"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let name = row.require_text("NICKNAME")?;
        let id = row.uuid("UUID")?.unwrap_or_else(|| offline_id(name));

        let mut identity = imported(id, name);
        identity.premium_id = row.uuid("PREMIUMUUID")?;
        identity.credential = row
            .text("HASH")
            .map(|raw| {
                bcrypt_verbatim(raw).ok_or_else(|| RowError::CredentialFormat("non-bcrypt HASH".to_string()))
            })
            .transpose()?;
        identity.ip = row.text("IP").map(str::to_string);
        identity.secret = row.text("TOTPTOKEN").map(str::to_string);
        identity.join_date = row.epoch_millis("REGDATE");
        identity.last_seen = row.epoch_millis("LOGINDATE");

        Ok(identity)
    }
}
