//! Bulk import of identities from other authentication products.
//!
//! Each [`FormatAdapter`] knows one product's table layout and password
//! encoding. The [`ImporterRegistry`] exposes every adapter once per backend
//! it supports, as `<product>-<backend>` (`authme-mysql`, `nlogin-sqlite`, ...).
//!
//! An [`ImportJob`] reads the whole legacy table, closes the source, then
//! hands the parsed identities to [`IdentityStore::insert_many`]. Rows that
//! fail to parse are logged and counted, never fatal. Products without a
//! stable id get one derived from the display name, so re-running a job
//! inserts nothing new.
//!
//! [`IdentityStore::insert_many`]: crate::db::IdentityStore::insert_many

pub mod adapter;
pub mod adapters;
pub mod errors;
pub mod job;
pub mod models;
pub mod reader;
pub mod registry;

pub use adapter::FormatAdapter;
pub use errors::{ImportError, ImportResult, RowError, RowResult};
pub use job::ImportJob;
pub use models::{ColumnKind, ColumnDef, ImportReport, LegacyRow, LegacyValue};
pub use reader::{ReadOutcome, RowSource, read_identities, read_rows};
pub use registry::{Importer, ImporterRegistry};
