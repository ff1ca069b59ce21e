//! Import job orchestration: read everything, then bulk insert.

use super::{
    errors::{ImportError, ImportResult},
    models::ImportReport,
    reader::{ReadOutcome, read_identities},
    registry::{Importer, ImporterRegistry},
};
use crate::{crypto::CryptoRegistry, db::Connector, db::IdentityStore};

/// One configured import from a legacy table into the active store
#[derive(Clone)]
pub struct ImportJob {
    importer: Importer,
    table: String,
}

impl ImportJob {
    /// Bind an importer to its source table
    ///
    /// # Arguments
    ///
    /// * `importer` - Adapter and backend to read with
    /// * `table` - Overrides the adapter's default table
    ///
    /// # Errors
    ///
    /// * `ImportError::MissingTable` - No override and no default table
    pub fn new(importer: Importer, table: Option<&str>) -> ImportResult<Self> {
        let table = table
            .filter(|t| !t.is_empty())
            .or(importer.adapter.default_table())
            .ok_or_else(|| ImportError::MissingTable(importer.id.clone()))?
            .to_string();

        Ok(Self { importer, table })
    }

    /// Look up `importer_id` and bind it to its source table
    pub fn from_registry(
        registry: &ImporterRegistry,
        importer_id: &str,
        table: Option<&str>,
    ) -> ImportResult<Self> {
        let importer = registry
            .get(importer_id)
            .cloned()
            .ok_or_else(|| ImportError::UnknownImporter(importer_id.to_string()))?;
        Self::new(importer, table)
    }

    pub fn importer_id(&self) -> &str {
        &self.importer.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Run the import
    ///
    /// The source is read completely and closed before anything is written.
    /// Any failure before the write phase leaves `target` untouched.
    ///
    /// # Arguments
    ///
    /// * `source` - Connector to the legacy database, closed when the read ends
    /// * `crypto` - Rows whose algorithm is not registered here are skipped
    /// * `target` - Active store receiving the identities
    ///
    /// # Returns
    ///
    /// * `ImportResult<ImportReport>` - Row counts for the whole job
    pub async fn run(
        &self,
        source: &Connector,
        crypto: &CryptoRegistry,
        target: &dyn IdentityStore,
    ) -> ImportResult<ImportReport> {
        if source.kind() != self.importer.backend {
            return Err(ImportError::BackendMismatch {
                importer: self.importer.id.clone(),
                expected: self.importer.backend,
                actual: source.kind(),
            });
        }

        log::info!(
            "Reading identities with {} from table {}",
            self.importer.id,
            self.table
        );

        source.connect().await.map_err(ImportError::Source)?;
        let outcome = self.read(source, crypto).await;
        source.disconnect().await;
        let outcome = outcome?;

        let parsed = outcome.identities.len() as u64;
        let inserted = target
            .insert_many(&outcome.identities)
            .await
            .map_err(ImportError::Target)?;

        let report = ImportReport {
            read: outcome.read,
            skipped: outcome.skipped,
            inserted,
            already_present: parsed.saturating_sub(inserted),
        };

        log::info!(
            "Import {} finished: {} read, {} skipped, {} inserted, {} already present",
            self.importer.id,
            report.read,
            report.skipped,
            report.inserted,
            report.already_present
        );

        Ok(report)
    }

    async fn read(&self, source: &Connector, crypto: &CryptoRegistry) -> ImportResult<ReadOutcome> {
        let mut conn = source.acquire().await.map_err(ImportError::Source)?;
        read_identities(&mut conn, self.importer.adapter.as_ref(), &self.table, crypto).await
    }
}
