//! JPremium user table.

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
    ColumnDef::required("uniqueId", ColumnKind::Text),
    ColumnDef::optional("premiumId", ColumnKind::Text),
    ColumnDef::required("lastNickname", ColumnKind::Text),
    ColumnDef::optional("lastSeen", ColumnKind::Timestamp),
    ColumnDef::optional("firstSeen", ColumnKind::Timestamp),
    ColumnDef::required("hashedPassword", ColumnKind::Text),
];

/// JPremium prefixes hashes with the algorithm name:
/// `SHA256$<salt>$<hash>`, `SHA512$<salt>$<hash>` or `BCRYPT$<cost>$<rest>`.
pub struct JPremiumAdapter;

fn parse_password(raw: &str) -> RowResult<HashedPassword> {
    let mut parts = raw.split('$');
    let algorithm = parts.next().unwrap_or_default();

    let digest = match algorithm {
        "SHA256" => "SHA-256",
        "SHA512" => "SHA-512",
        "BCRYPT" => {
            return bcrypt_verbatim(&raw.replacen("BCRYPT", "$2a", 1))
                .ok_or_else(|| RowError::CredentialFormat("BCRYPT".to_string()));
        }
        other => return Err(RowError::CredentialFormat(other.to_string())),
    };

    match (parts.next(), parts.next()) {
        (Some(salt), Some(hash)) if !hash.is_empty() => {
            Ok(HashedPassword::new(hash, Some(salt.to_string()), digest))
        }
        _ => Err(RowError::CredentialFormat(format!("malformed {algorithm} hash"))),
    }
}

impl FormatAdapter for JPremiumAdapter {
    fn id(&self) -> &'static str {
        "jpremium"
    }

    fn backends(&self) -> &'static [BackendKind] {
        &[BackendKind::MySql]
    }

    fn name_column(&self) -> &'static str {
        "lastNickname"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity> {
        let name = row.require_text("lastNickname")?;
        let id = row.require_uuid("uniqueId")?;

        let mut identity = imported(id, name);
        identity.premium_id = row.uuid("premiumId")?;
        identity.credential = row.text("hashedPassword").map(parse_password).transpose()?;
        identity.join_date = row.timestamp("firstSeen");
        identity.last_seen = row.timestamp("lastSeen");

        Ok(identity)
    }
}
