//! Structured logging configuration.
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! bridges those records into `tracing` next to the server's own events.
//! Session security events arrive as structured events under the
//! `gatekeep::security` target.

use gatekeep::ImportReport;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Levels come from `RUST_LOG`, defaulting to `info,sqlx=warn`.
///
/// # Example
///
/// ```no_run
/// use gk_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `nickname` - Optional player name
/// * `ip_address` - Optional IP address
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use gk_server::logging::log_security_event;
///
/// log_security_event(
///     "fatal_storage",
///     None,
///     None,
///     "Storage connection lost"
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    nickname: Option<&str>,
    ip_address: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        nickname = nickname,
        ip_address = ip_address,
        "{}",
        message
    );
}

/// Log the outcome of a startup import
pub fn log_import_report(importer: &str, report: &ImportReport) {
    tracing::info!(
        importer = importer,
        read = report.read,
        skipped = report.skipped,
        inserted = report.inserted,
        already_present = report.already_present,
        "Import finished"
    );

    if report.skipped > 0 {
        tracing::warn!(
            importer = importer,
            skipped = report.skipped,
            "Some legacy rows could not be imported; see earlier warnings"
        );
    }
}
