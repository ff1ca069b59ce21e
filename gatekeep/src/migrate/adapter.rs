//! Format adapter contract.

use super::{
    errors::RowResult,
    models::{ColumnDef, LegacyRow},
};
use crate::{db::BackendKind, identity::Identity};

/// Reads one legacy product's table layout into canonical identities.
///
/// The reader decodes exactly the columns returned by [`FormatAdapter::columns`]
/// and hands each row to [`FormatAdapter::parse_row`]. A row error skips that
/// row only.
pub trait FormatAdapter: Send + Sync {
    /// Product id, combined with a backend into the importer id
    /// (`authme` + `mysql` = `authme-mysql`)
    fn id(&self) -> &'static str;

    /// Backends this product is known to store its table in
    fn backends(&self) -> &'static [BackendKind];

    /// Table read when `migration.old-table-name` is not set
    fn default_table(&self) -> Option<&'static str> {
        None
    }

    /// Column holding the display name, used when logging skipped rows
    fn name_column(&self) -> &'static str;

    fn columns(&self) -> &'static [ColumnDef];

    fn parse_row(&self, row: &LegacyRow) -> RowResult<Identity>;
}
