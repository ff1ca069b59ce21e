//! Store ids selectable through `database.type`.

use super::{
    config::BackendKind,
    connector::Connector,
    errors::{DatabaseError, DatabaseResult},
    repository::{IdentityStore, SqlIdentityStore},
};
use std::sync::Arc;

pub const STORE_PREFIX: &str = "gatekeep";

/// Every registered store id
pub fn store_ids() -> Vec<String> {
    BackendKind::ALL
        .iter()
        .map(|kind| format!("{STORE_PREFIX}-{kind}"))
        .collect()
}

/// Backend a store id runs on, if the id is registered
pub fn backend_for_store(store_id: &str) -> Option<BackendKind> {
    let (prefix, backend) = store_id.split_once('-')?;
    if prefix != STORE_PREFIX {
        return None;
    }
    BackendKind::ALL
        .into_iter()
        .find(|kind| kind.as_str() == backend)
}

/// Build the store registered as `store_id` on top of `connector`
///
/// # Errors
///
/// * `DatabaseError::UnknownStore` - Id not registered or backend mismatch
pub fn open_store(store_id: &str, connector: Arc<Connector>) -> DatabaseResult<Arc<dyn IdentityStore>> {
    match backend_for_store(store_id) {
        Some(kind) if kind == connector.kind() => Ok(Arc::new(SqlIdentityStore::new(connector))),
        _ => Err(DatabaseError::UnknownStore(store_id.to_string())),
    }
}
