//! Host capability injected into the core.

use crate::identity::IdentityId;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// What the core needs from the process hosting it.
///
/// Implemented once per host and passed in by composition.
pub trait PlatformHandle: Send + Sync {
    /// Directory for host-local files (sqlite databases, exports)
    fn data_dir(&self) -> &Path;

    fn version(&self) -> &str;

    /// Whether a player with this id is currently connected anywhere
    fn is_online(&self, id: IdentityId) -> bool;

    /// Server the player is currently on, if any
    fn current_server(&self, id: IdentityId) -> Option<String>;

    /// Drop the player's connection with a reason
    fn disconnect(&self, id: IdentityId, reason: &str);
}

/// In-process host used by the standalone server and tests.
///
/// Presence is tracked explicitly through [`StaticPlatform::join`] and
/// [`StaticPlatform::leave`].
pub struct StaticPlatform {
    data_dir: PathBuf,
    version: String,
    online: RwLock<HashMap<IdentityId, Option<String>>>,
    kicked: RwLock<Vec<(IdentityId, String)>>,
}

impl StaticPlatform {
    pub fn new(data_dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            version: version.into(),
            online: RwLock::new(HashMap::new()),
            kicked: RwLock::new(Vec::new()),
        }
    }

    pub fn join(&self, id: IdentityId, server: Option<String>) {
        self.online.write().insert(id, server);
    }

    pub fn leave(&self, id: IdentityId) {
        self.online.write().remove(&id);
    }

    /// Disconnects issued so far, oldest first
    pub fn kicked(&self) -> Vec<(IdentityId, String)> {
        self.kicked.read().clone()
    }
}

impl PlatformHandle for StaticPlatform {
    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn is_online(&self, id: IdentityId) -> bool {
        self.online.read().contains_key(&id)
    }

    fn current_server(&self, id: IdentityId) -> Option<String> {
        self.online.read().get(&id).cloned().flatten()
    }

    fn disconnect(&self, id: IdentityId, reason: &str) {
        log::info!("Disconnecting {}: {}", id, reason);
        self.online.write().remove(&id);
        self.kicked.write().push((id, reason.to_string()));
    }
}
