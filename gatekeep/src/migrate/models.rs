//! Legacy row representation and import reporting.

use super::errors::{RowError, RowResult};
use crate::identity::parse_id;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// How a legacy column is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Timestamp,
}

/// One column an adapter reads from its legacy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// When set, a table without this column fails the whole job
    pub required: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A decoded legacy value
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyValue {
    Null,
    Text(String),
    Integer(i64),
    Timestamp(NaiveDateTime),
}

/// One legacy row, keyed by lowercase column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyRow {
    values: HashMap<String, LegacyValue>,
}

impl LegacyRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by readers and tests
    pub fn with(mut self, column: &str, value: LegacyValue) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: LegacyValue) {
        self.values.insert(column.to_ascii_lowercase(), value);
    }

    pub fn get(&self, column: &str) -> &LegacyValue {
        self.values
            .get(&column.to_ascii_lowercase())
            .unwrap_or(&LegacyValue::Null)
    }

    /// Text value; empty strings count as absent
    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            LegacyValue::Text(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn require_text(&self, column: &'static str) -> RowResult<&str> {
        self.text(column).ok_or(RowError::MissingValue(column))
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            LegacyValue::Integer(i) => Some(*i),
            LegacyValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match self.get(column) {
            LegacyValue::Timestamp(t) => Some(t.and_utc()),
            _ => None,
        }
    }

    /// Integer column holding epoch milliseconds; zero means never
    pub fn epoch_millis(&self, column: &str) -> Option<DateTime<Utc>> {
        self.integer(column)
            .filter(|ms| *ms > 0)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// Integer column holding epoch seconds; zero means never
    pub fn epoch_secs(&self, column: &str) -> Option<DateTime<Utc>> {
        self.integer(column)
            .filter(|s| *s > 0)
            .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
    }

    /// Optional id column, dashed or undashed
    pub fn uuid(&self, column: &'static str) -> RowResult<Option<Uuid>> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => parse_id(raw).map(Some).ok_or_else(|| RowError::InvalidId {
                column,
                value: raw.to_string(),
            }),
        }
    }

    pub fn require_uuid(&self, column: &'static str) -> RowResult<Uuid> {
        self.uuid(column)?.ok_or(RowError::MissingValue(column))
    }
}

/// Outcome of one import job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows read from the legacy table
    pub read: usize,
    /// Rows dropped during parsing
    pub skipped: usize,
    /// Identities newly written to the target store
    pub inserted: u64,
    /// Parsed identities the target already held
    pub already_present: u64,
}
