//! Full-table reads of legacy schemas.

use super::{
    adapter::FormatAdapter,
    errors::{ImportError, ImportResult, RowError, RowResult},
    models::{ColumnKind, LegacyRow, LegacyValue},
};
use crate::{
    crypto::CryptoRegistry,
    db::{Connection, DatabaseError, connector::with_connection, dialect_for},
    identity::Identity,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::Row;
use std::collections::HashMap;

/// A driver row the reader can decode column by column
pub trait RowSource {
    fn column_names(&self) -> Vec<String>;

    fn decode(&self, index: usize, kind: ColumnKind) -> Result<LegacyValue, sqlx::Error>;
}

fn or_null<T>(value: Option<T>, wrap: impl FnOnce(T) -> LegacyValue) -> LegacyValue {
    value.map_or(LegacyValue::Null, wrap)
}

macro_rules! impl_row_source {
    ($row:ty) => {
        impl RowSource for $row {
            fn column_names(&self) -> Vec<String> {
                self.columns().iter().map(|c| sqlx::Column::name(c).to_string()).collect()
            }

            fn decode(&self, index: usize, kind: ColumnKind) -> Result<LegacyValue, sqlx::Error> {
                match kind {
                    ColumnKind::Text => {
                        if let Ok(v) = self.try_get::<Option<String>, _>(index) {
                            return Ok(or_null(v, LegacyValue::Text));
                        }
                        if let Ok(v) = self.try_get::<Option<Vec<u8>>, _>(index) {
                            return Ok(or_null(v, |b| {
                                LegacyValue::Text(String::from_utf8_lossy(&b).into_owned())
                            }));
                        }
                        self.try_get::<Option<i64>, _>(index)
                            .map(|v| or_null(v, |i| LegacyValue::Text(i.to_string())))
                    }
                    ColumnKind::Integer => {
                        if let Ok(v) = self.try_get::<Option<i64>, _>(index) {
                            return Ok(or_null(v, LegacyValue::Integer));
                        }
                        if let Ok(v) = self.try_get::<Option<i32>, _>(index) {
                            return Ok(or_null(v, |i| LegacyValue::Integer(i64::from(i))));
                        }
                        match self.try_get::<Option<String>, _>(index)? {
                            None => Ok(LegacyValue::Null),
                            Some(s) => s
                                .trim()
                                .parse()
                                .map(LegacyValue::Integer)
                                .map_err(|e| sqlx::Error::Decode(Box::new(e))),
                        }
                    }
                    ColumnKind::Timestamp => {
                        if let Ok(v) = self.try_get::<Option<NaiveDateTime>, _>(index) {
                            return Ok(or_null(v, LegacyValue::Timestamp));
                        }
                        if let Ok(v) = self.try_get::<Option<DateTime<Utc>>, _>(index) {
                            return Ok(or_null(v, |t| LegacyValue::Timestamp(t.naive_utc())));
                        }
                        self.try_get::<Option<NaiveDate>, _>(index).map(|v| {
                            or_null(v.and_then(|d| d.and_hms_opt(0, 0, 0)), LegacyValue::Timestamp)
                        })
                    }
                }
            }
        }
    };
}

impl_row_source!(sqlx::mysql::MySqlRow);
impl_row_source!(sqlx::postgres::PgRow);
impl_row_source!(sqlx::sqlite::SqliteRow);

/// Rows parsed out of one legacy table
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub identities: Vec<Identity>,
    pub read: usize,
    pub skipped: usize,
}

fn check_table_name(table: &str) -> ImportResult<()> {
    let plain = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '$'));

    if plain {
        Ok(())
    } else {
        Err(ImportError::InvalidTable(table.to_string()))
    }
}

/// Decode the adapter's columns out of every driver row.
///
/// A required column absent from the table fails the whole read; a value
/// that does not decode only fails its own row.
pub fn decode_rows<R: RowSource>(
    rows: &[R],
    adapter: &dyn FormatAdapter,
    table: &str,
) -> ImportResult<Vec<RowResult<LegacyRow>>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let positions: HashMap<String, usize> = first
        .column_names()
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.to_ascii_lowercase(), i))
        .collect();

    let mut layout = Vec::with_capacity(adapter.columns().len());
    for def in adapter.columns() {
        match positions.get(&def.name.to_ascii_lowercase()) {
            Some(index) => layout.push((def, Some(*index))),
            None if def.required => {
                return Err(ImportError::MissingColumn {
                    table: table.to_string(),
                    column: def.name,
                });
            }
            None => layout.push((def, None)),
        }
    }

    Ok(rows
        .iter()
        .map(|row| {
            let mut legacy = LegacyRow::new();
            for (def, index) in &layout {
                let value = match index {
                    Some(index) => row.decode(*index, def.kind).map_err(|e| RowError::Decode {
                        column: def.name,
                        reason: e.to_string(),
                    })?,
                    None => LegacyValue::Null,
                };
                legacy.set(def.name, value);
            }
            Ok(legacy)
        })
        .collect())
}

/// `SELECT *` the legacy table over an acquired connection
///
/// # Errors
///
/// * `ImportError::InvalidTable` - Table name is not a plain identifier
/// * `ImportError::MissingColumn` - A required column is absent
/// * `ImportError::Source` - The query failed
pub async fn read_rows(
    conn: &mut Connection,
    adapter: &dyn FormatAdapter,
    table: &str,
) -> ImportResult<Vec<RowResult<LegacyRow>>> {
    check_table_name(table)?;
    let sql = format!("SELECT * FROM {}", dialect_for(conn.kind()).quote_ident(table));

    with_connection!(conn, c => {
        let rows = sqlx::query(&sql)
            .fetch_all(c)
            .await
            .map_err(|e| ImportError::Source(DatabaseError::Query(e)))?;
        decode_rows(&rows, adapter, table)
    })
}

fn parse_checked(
    adapter: &dyn FormatAdapter,
    crypto: &CryptoRegistry,
    row: &LegacyRow,
) -> RowResult<Identity> {
    let identity = adapter.parse_row(row)?;

    if let Some(credential) = &identity.credential
        && !crypto.supports(&credential.algorithm)
    {
        return Err(RowError::UnsupportedAlgorithm(credential.algorithm.clone()));
    }

    Ok(identity)
}

/// Read and parse every row of `table`, skipping and logging bad rows
pub async fn read_identities(
    conn: &mut Connection,
    adapter: &dyn FormatAdapter,
    table: &str,
    crypto: &CryptoRegistry,
) -> ImportResult<ReadOutcome> {
    let rows = read_rows(conn, adapter, table).await?;
    let mut outcome = ReadOutcome {
        identities: Vec::with_capacity(rows.len()),
        read: rows.len(),
        skipped: 0,
    };

    for (index, decoded) in rows.into_iter().enumerate() {
        let parsed = decoded.and_then(|row| {
            parse_checked(adapter, crypto, &row).map_err(|e| {
                let name = row.text(adapter.name_column()).unwrap_or("<unnamed>");
                log::warn!("[{}] Skipping {} (row {}): {}", adapter.id(), name, index + 1, e);
                e
            })
        });

        match parsed {
            Ok(identity) => outcome.identities.push(identity),
            Err(RowError::Decode { column, reason }) => {
                log::warn!(
                    "[{}] Skipping row {}: cannot decode {}: {}",
                    adapter.id(),
                    index + 1,
                    column,
                    reason
                );
                outcome.skipped += 1;
            }
            Err(_) => outcome.skipped += 1,
        }
    }

    Ok(outcome)
}
