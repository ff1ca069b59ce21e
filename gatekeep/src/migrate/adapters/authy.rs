//! Authy `players` table.

use super::imported;
use crate::{
    crypto::HashedPassword,
    db::BackendKind,
    identity::Identity,
    migrate::{
        adapter::FormatAdapter,
        errors::RowResult,
        models::{ColumnKind, ColumnDef, LegacyRow},
    },
};
use chrono::Utc;

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("uuid", ColumnKind::Text),
    ColumnDef::required("username", ColumnKind::Text),
    ColumnDef::required("password", ColumnKind::Text),
    ColumnDef::optional("ip", ColumnKind::Text),
];

/// Authy stores plain unsalted SHA-256 hex digests and no timestamps.
pub struct AuthyAdapter;

impl FormatAdapter for AuthyAdapter {
    fn id(&self) -> &'static str {
        "authy"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql, BackendKind::Sqlite]
    }

    fn default_table(&self) -> Option<&'static str> {
        Some("players")
    }

    fn name_column(&self) -> &'static str {
        "username"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let id = row.require_uuid("uuid")?;
        let name = row.require_text("username")?;
        let now = Utc::now();

        let mut identity = imported(id, name);
        identity.credential = row
            .text("password")
            .map(|hash| HashedPassword::new(hash, None, "SHA-256"));
        identity.ip = row.text("ip").map(str::to_string);
        identity.join_date = Some(now);
        identity.last_seen = Some(now);

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::{adapters::text, errors::RowError};

    #[test]
    fn test_unsalted_sha256() {
        let row = LegacyRow::new()
            .with("uuid", text("069a79f4-44e9-4726-a5be-fca90e38aaf5"))
            .with("username", text("Notch"))
            .with("password", text("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"))
            .with("ip", text("10.0.0.1"));

        let identity = AuthyAdapter.parse_row(&row).unwrap();
        let credential = identity.credential.unwrap();
        assert_eq!(credential.algorithm, "SHA-256");
        assert_eq!(credential.salt, None);
        assert_eq!(identity.ip.as_deref(), Some("10.0.0.1"));
        assert!(identity.join_date.is_some());
    }

    #[test]
    fn test_missing_uuid_skips() {
        let row = LegacyRow::new().with("username", text("Notch"));
        assert!(matches!(AuthyAdapter.parse_row(&row), Err(RowError::MissingValue("uuid"))));
    }
}
