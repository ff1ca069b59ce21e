//! Standalone gatekeep server.
//!
//! Loads configuration, opens and validates the identity store, runs the
//! optional legacy import and keeps the authorization provider alive until
//! interrupted or storage is lost.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Error};
use gatekeep::{
    AuthorizationProvider, CryptoRegistry,
    config::EnvSource,
    db::{Connector, open_store},
    migrate::{ImportJob, ImporterRegistry},
    platform::StaticPlatform,
    runtime::{Halt, Scheduler, WorkerPool},
};
use gk_server::{
    config::ServerConfig,
    logging::{self, log_import_report, log_security_event},
};
use pico_args::Arguments;
use tracing::{error, info, warn};

const HELP: &str = "\
Run a standalone gatekeep authentication core

USAGE:
  gk_server [OPTIONS]

OPTIONS:
  --data-dir   PATH        Directory for SQLite databases  [default: env GATEKEEP_SERVER_DATA_DIR or data]

FLAGS:
  -h, --help               Print help information
  --keys                   List every configuration key with its default

ENVIRONMENT:
  GATEKEEP_<KEY>           Any configuration key, upper-cased with dots and
                           dashes as underscores (e.g. GATEKEEP_DATABASE_TYPE)
  RUST_LOG                 Log filter  [default: info,sqlx=warn]
  (A .env file in the working directory is loaded first)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    if pargs.contains("--keys") {
        print!("{}", ServerConfig::describe());
        std::process::exit(0);
    }

    let data_dir: Option<PathBuf> = pargs.opt_value_from_str("--data-dir")?;
    let unused = pargs.finish();

    logging::init();
    if !unused.is_empty() {
        warn!("Ignoring unknown arguments: {:?}", unused);
    }

    let config = match ServerConfig::load(&EnvSource, data_dir) {
        Ok(config) => config,
        Err(e) => fatal(None, Error::new(e).context("Invalid configuration")).await,
    };

    info!(
        "Starting gatekeep {} with store {}",
        env!("CARGO_PKG_VERSION"),
        config.core.store_id
    );

    let halt = Halt::new();
    let connector = Arc::new(Connector::new(config.core.connector.clone(), halt.clone()));

    let provider = match bootstrap(&config, connector.clone()).await {
        Ok(provider) => provider,
        Err(e) => {
            connector.disconnect().await;
            fatal(Some(&config), e).await
        }
    };

    info!(
        "Ready; default credential algorithm is {}. Press Ctrl+C to stop.",
        config.core.crypto_default
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Shutting down...");
        }
        reason = halt.raised() => {
            log_security_event("storage_lost", None, None, &reason);
            connector.disconnect().await;
            fatal(Some(&config), anyhow::anyhow!("Storage lost: {reason}")).await;
        }
    }

    drop(provider);
    connector.disconnect().await;
    info!("Shutdown complete");
    Ok(())
}

/// Startup sequence: crypto check, connect, schema validation, optional
/// import, provider
async fn bootstrap(
    config: &ServerConfig,
    connector: Arc<Connector>,
) -> Result<AuthorizationProvider, Error> {
    let crypto: Arc<CryptoRegistry> = Arc::new(
        config
            .core
            .crypto_registry()
            .context("Credential providers failed to initialise")?,
    );

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.data_dir.display())
    })?;

    connector
        .connect()
        .await
        .context("Failed to connect to the identity store")?;

    let store = open_store(&config.core.store_id, connector)?;
    store
        .validate_schema()
        .await
        .context("Identity table failed validation")?;
    info!("Identity store holds {} identities", store.count().await?);

    if let Some(migration) = &config.core.migration {
        let job = ImportJob::from_registry(
            &ImporterRegistry::with_builtin(),
            &migration.importer_id,
            migration.table.as_deref(),
        )?;
        // The legacy database may go away without taking the server with it
        let source = Connector::new(migration.source.clone(), Halt::new());

        match job.run(&source, &crypto, store.as_ref()).await {
            Ok(report) => log_import_report(job.importer_id(), &report),
            Err(e) if e.is_fatal() => return Err(Error::new(e).context("Import lost the identity store")),
            Err(e) => error!("Import {} aborted, store untouched: {}", job.importer_id(), e),
        }
    }

    let platform = Arc::new(StaticPlatform::new(
        config.data_dir.clone(),
        env!("CARGO_PKG_VERSION"),
    ));

    Ok(AuthorizationProvider::new(
        store,
        crypto,
        WorkerPool::current(config.core.max_blocking),
        Scheduler::current(),
        platform,
        config.core.auth.clone(),
    ))
}

/// Report a fatal error and exit after the grace delay
async fn fatal(config: Option<&ServerConfig>, err: Error) -> ! {
    error!("{err:#}");

    let grace = config.map_or(std::time::Duration::from_secs(5), |c| c.shutdown_grace);
    error!("Exiting in {} seconds", grace.as_secs());
    tokio::time::sleep(grace).await;
    std::process::exit(1);
}
