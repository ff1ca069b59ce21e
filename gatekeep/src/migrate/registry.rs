//! Importer ids selectable through `migration.type`.

use super::{
    adapter::FormatAdapter,
    adapters::{
        AuthMeAdapter, AuthyAdapter, CanonicalAdapter, JPremiumAdapter, LimboAuthAdapter,
        LogItAdapter, LoginSecurityAdapter, NLoginAdapter,
    },
};
use crate::db::BackendKind;
use std::{collections::BTreeMap, sync::Arc};

/// An adapter bound to one backend
#[derive(Clone)]
pub struct Importer {
    pub id: String,
    pub adapter: Arc<dyn FormatAdapter>,
    pub backend: BackendKind,
}

/// Importers keyed by `<adapter>-<backend>`
#[derive(Clone, Default)]
pub struct ImporterRegistry {
    importers: BTreeMap<String, Importer>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in adapter
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let adapters: Vec<Arc<dyn FormatAdapter>> = vec![
            Arc::new(CanonicalAdapter),
            Arc::new(AuthMeAdapter),
            Arc::new(AuthyAdapter),
            Arc::new(JPremiumAdapter),
            Arc::new(LimboAuthAdapter),
            Arc::new(LoginSecurityAdapter),
            Arc::new(LogItAdapter),
            Arc::new(NLoginAdapter),
        ];
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    /// Register an adapter once per backend it declares
    pub fn register(&mut self, adapter: Arc<dyn FormatAdapter>) {
        for backend in adapter.backends() {
            let id = format!("{}-{}", adapter.id(), backend);
            self.importers.insert(
                id.clone(),
                Importer {
                    id,
                    adapter: adapter.clone(),
                    backend: *backend,
                },
            );
        }
    }

    pub fn get(&self, importer_id: &str) -> Option<&Importer> {
        self.importers.get(importer_id)
    }

    pub fn contains(&self, importer_id: &str) -> bool {
        self.importers.contains_key(importer_id)
    }

    /// Registered importer ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        self.importers.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids() {
        let registry = ImporterRegistry::with_builtin();
        assert_eq!(
            registry.ids(),
            vec![
                "authme-mysql",
                "authme-postgresql",
                "authme-sqlite",
                "authy-mysql",
                "authy-sqlite",
                "gatekeep-mysql",
                "gatekeep-postgresql",
                "gatekeep-sqlite",
                "jpremium-mysql",
                "limboauth-mysql",
                "loginsecurity-mysql",
                "loginsecurity-sqlite",
                "logit-mysql",
                "nlogin-mysql",
                "nlogin-sqlite",
            ]
        );
    }

    #[test]
    fn test_lookup_binds_backend() {
        let registry = ImporterRegistry::with_builtin();
        let importer = registry.get("authme-sqlite").unwrap();
        assert_eq!(importer.backend, BackendKind::Sqlite);
        assert_eq!(importer.adapter.id(), "authme");
        assert!(!registry.contains("jpremium-sqlite"));
    }
}
