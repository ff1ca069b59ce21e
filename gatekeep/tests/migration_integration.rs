//! End-to-end import tests: legacy SQLite tables into a SQLite identity store.

use gatekeep::auth::{AuthSettings, AuthorizationProvider, SessionState};
use gatekeep::crypto::{CryptoRegistry, HashedPassword};
use gatekeep::db::{Connector, ConnectorConfig, IdentityStore, SqlIdentityStore};
use gatekeep::identity::{Identity, offline_id};
use gatekeep::migrate::{ImportError, ImportJob, ImporterRegistry};
use gatekeep::platform::StaticPlatform;
use gatekeep::runtime::{Halt, Scheduler, WorkerPool};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use uuid::Uuid;

const AUTHME_TABLE: &str = "CREATE TABLE authme (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username VARCHAR(255) NOT NULL,
    realname VARCHAR(255),
    password VARCHAR(255),
    ip VARCHAR(40),
    lastlogin BIGINT,
    regdate BIGINT,
    email VARCHAR(255),
    totp VARCHAR(32)
)";

async fn legacy_pool(path: &Path) -> SqlitePool {
    SqlitePool::connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
        .await
        .unwrap()
}

async fn insert_authme(pool: &SqlitePool, name: &str, password: &str, lastlogin: i64, regdate: i64) {
    sqlx::query(
        "INSERT INTO authme (username, realname, password, lastlogin, regdate) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name.to_lowercase())
    .bind(name)
    .bind(password)
    .bind(lastlogin)
    .bind(regdate)
    .execute(pool)
    .await
    .unwrap();
}

async fn target_store(dir: &TempDir) -> SqlIdentityStore {
    let connector = Arc::new(Connector::new(
        ConnectorConfig::sqlite(dir.path().join("gatekeep.db")),
        Halt::new(),
    ));
    connector.connect().await.unwrap();
    let store = SqlIdentityStore::new(connector);
    store.validate_schema().await.unwrap();
    store
}

fn source(dir: &TempDir) -> Connector {
    Connector::new(ConnectorConfig::sqlite(dir.path().join("legacy.db")), Halt::new())
}

fn job(importer_id: &str) -> ImportJob {
    ImportJob::from_registry(&ImporterRegistry::with_builtin(), importer_id, None).unwrap()
}

fn crypto() -> CryptoRegistry {
    CryptoRegistry::with_builtin("BCrypt-2A").unwrap()
}

#[tokio::test]
async fn test_authme_single_row() {
    let dir = tempdir().unwrap();
    let pool = legacy_pool(&dir.path().join("legacy.db")).await;
    sqlx::query(AUTHME_TABLE).execute(&pool).await.unwrap();
    insert_authme(&pool, "Bob", "$SHA$s1$h1", 0, 0).await;
    pool.close().await;

    let store = target_store(&dir).await;
    let report = job("authme-sqlite")
        .run(&source(&dir), &crypto(), &store)
        .await
        .unwrap();

    assert_eq!((report.read, report.skipped, report.inserted), (1, 0, 1));

    let bob = store.get_by_id(offline_id("Bob")).await.unwrap().unwrap();
    assert_eq!(bob.last_nickname, "Bob");
    assert_eq!(
        bob.credential,
        Some(HashedPassword::new("h1", Some("s1".to_string()), "SHA-256"))
    );
    assert!(bob.join_date.is_none());
    assert!(bob.last_seen.is_none());
}

#[tokio::test]
async fn test_authme_bad_row_is_skipped_and_rerun_inserts_nothing() {
    let dir = tempdir().unwrap();
    let pool = legacy_pool(&dir.path().join("legacy.db")).await;
    sqlx::query(AUTHME_TABLE).execute(&pool).await.unwrap();
    for i in 0..100 {
        insert_authme(&pool, &format!("player{i}"), &format!("$SHA$salt{i}$hash{i}"), 1_600_000_000_000, 0)
            .await;
    }
    insert_authme(&pool, "broken", "$MD5$not-supported", 0, 0).await;
    pool.close().await;

    let store = target_store(&dir).await;
    let crypto = crypto();
    let job = job("authme-sqlite");

    let first = job.run(&source(&dir), &crypto, &store).await.unwrap();
    assert_eq!(first.read, 101);
    assert_eq!(first.skipped, 1);
    assert_eq!(first.inserted, 100);
    assert_eq!(store.count().await.unwrap(), 100);
    assert!(store.get_by_name("broken").await.unwrap().is_none());

    let second = job.run(&source(&dir), &crypto, &store).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.already_present, 100);
    assert_eq!(store.count().await.unwrap(), 100);
}

#[tokio::test]
async fn test_authy_invalid_uuid_skipped() {
    let dir = tempdir().unwrap();
    let pool = legacy_pool(&dir.path().join("legacy.db")).await;
    sqlx::query("CREATE TABLE players (uuid VARCHAR(36), username VARCHAR(16), password VARCHAR(64), ip VARCHAR(40))")
        .execute(&pool)
        .await
        .unwrap();
    let alice = Uuid::new_v4();
    for (uuid, name) in [(alice.to_string(), "Alice"), ("not-a-uuid".to_string(), "Mallory")] {
        sqlx::query("INSERT INTO players VALUES (?, ?, ?, '10.0.0.1')")
            .bind(uuid)
            .bind(name)
            .bind("9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;

    let store = target_store(&dir).await;
    let report = job("authy-sqlite")
        .run(&source(&dir), &crypto(), &store)
        .await
        .unwrap();

    assert_eq!((report.read, report.skipped, report.inserted), (2, 1, 1));
    let credential = store.get_by_id(alice).await.unwrap().unwrap().credential.unwrap();
    assert_eq!(credential.algorithm, "SHA-256");
    assert!(crypto().verify("test", &credential).unwrap().is_match());
}

#[tokio::test]
async fn test_canonical_store_to_store() {
    let old_dir = tempdir().unwrap();
    {
        let old = target_store(&old_dir).await;
        let mut bob = Identity::new(offline_id("Bob"), "Bob");
        bob.premium_id = Some(Uuid::new_v4());
        bob.credential = Some(HashedPassword::new("h", Some("s".to_string()), "SHA-512"));
        old.insert(&bob).await.unwrap();
        old.insert(&Identity::new(offline_id("Alice"), "Alice")).await.unwrap();
        old.connector().disconnect().await;
    }

    let new_dir = tempdir().unwrap();
    let store = target_store(&new_dir).await;
    let source = Connector::new(
        ConnectorConfig::sqlite(old_dir.path().join("gatekeep.db")),
        Halt::new(),
    );

    let report = job("gatekeep-sqlite").run(&source, &crypto(), &store).await.unwrap();
    assert_eq!(report.inserted, 2);

    let bob = store.get_by_id(offline_id("Bob")).await.unwrap().unwrap();
    assert!(bob.premium_id.is_some());
    assert_eq!(bob.credential.unwrap().algorithm, "SHA-512");
}

#[tokio::test]
async fn test_missing_source_table_leaves_target_untouched() {
    let dir = tempdir().unwrap();
    legacy_pool(&dir.path().join("legacy.db")).await.close().await;

    let store = target_store(&dir).await;
    let result = job("authme-sqlite").run(&source(&dir), &crypto(), &store).await;

    assert!(matches!(result, Err(ImportError::Source(_))));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_required_column_aborts_job() {
    let dir = tempdir().unwrap();
    let pool = legacy_pool(&dir.path().join("legacy.db")).await;
    sqlx::query("CREATE TABLE authme (username VARCHAR(255), realname VARCHAR(255))")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO authme VALUES ('bob', 'Bob')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let store = target_store(&dir).await;
    let result = job("authme-sqlite").run(&source(&dir), &crypto(), &store).await;

    assert!(matches!(
        result,
        Err(ImportError::MissingColumn { column: "password", .. })
    ));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_backend_mismatch_rejected() {
    let dir = tempdir().unwrap();
    let store = target_store(&dir).await;
    let result = job("authme-mysql").run(&source(&dir), &crypto(), &store).await;
    assert!(matches!(result, Err(ImportError::BackendMismatch { .. })));
}

#[tokio::test]
async fn test_imported_legacy_hash_upgrades_on_login() {
    let dir = tempdir().unwrap();
    let crypto = Arc::new(CryptoRegistry::with_builtin_cost("BCrypt-2A", 4).unwrap());
    let legacy = crypto
        .provider("SHA-256")
        .unwrap()
        .create_hash("hunter22")
        .unwrap();

    let pool = legacy_pool(&dir.path().join("legacy.db")).await;
    sqlx::query(AUTHME_TABLE).execute(&pool).await.unwrap();
    let encoded = format!("$SHA${}${}", legacy.salt.clone().unwrap(), legacy.hash);
    insert_authme(&pool, "Carol", &encoded, 0, 0).await;
    pool.close().await;

    let store = Arc::new(target_store(&dir).await);
    let report = job("authme-sqlite").run(&source(&dir), &crypto, store.as_ref()).await.unwrap();
    assert_eq!(report.inserted, 1);

    let provider = AuthorizationProvider::new(
        store.clone(),
        crypto.clone(),
        WorkerPool::current(2),
        Scheduler::current(),
        Arc::new(StaticPlatform::new(dir.path(), "test")),
        AuthSettings::default(),
    );

    let mut session = provider.on_connect("Carol", Some("10.0.0.9"), None).await.unwrap();
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(provider.login(&mut session, "hunter22").await.unwrap(), SessionState::Authenticated);

    let carol = store.get_by_id(offline_id("Carol")).await.unwrap().unwrap();
    let credential = carol.credential.unwrap();
    assert_eq!(credential.algorithm, "BCrypt-2A");
    assert!(crypto.verify("hunter22", &credential).unwrap().is_match());
    assert!(carol.last_authentication.is_some());
}
