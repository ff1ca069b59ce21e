//! Identity store trait and its SQL implementation.

use super::{
    connector::{Connector, with_connection},
    dialect::{Dialect, IDENTITY_COLUMNS, dialect_for},
    errors::{DatabaseError, DatabaseResult},
    models::IdentityRow,
};
use crate::identity::{Identity, IdentityId};
use async_trait::async_trait;
use sqlx::Connection as _;
use std::{collections::HashSet, sync::Arc};

/// Canonical table name
pub const IDENTITY_TABLE: &str = "gatekeep_identity";

/// Largest number of rows sent in one bulk insert statement
const MAX_ROWS_PER_INSERT: usize = 500;

/// Canonical CRUD over one active backend.
///
/// Lookup misses are `Ok(None)`, never errors.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Registry id of this store, e.g. `gatekeep-sqlite`
    fn store_id(&self) -> String;

    async fn get_by_id(&self, id: IdentityId) -> DatabaseResult<Option<Identity>>;

    /// Case-insensitive lookup by last known nickname
    async fn get_by_name(&self, name: &str) -> DatabaseResult<Option<Identity>>;

    async fn get_by_premium_id(&self, premium_id: IdentityId) -> DatabaseResult<Option<Identity>>;

    /// Every identity last seen from `ip`
    async fn get_by_address(&self, ip: &str) -> DatabaseResult<HashSet<Identity>>;

    /// Insert one identity
    ///
    /// # Errors
    ///
    /// * `DatabaseError::Conflict` - Id, premium id or nickname already taken
    async fn insert(&self, identity: &Identity) -> DatabaseResult<()>;

    /// Insert every identity whose keys are not present yet, skipping the rest
    ///
    /// # Returns
    ///
    /// * `DatabaseResult<u64>` - Number of rows actually inserted
    async fn insert_many(&self, identities: &[Identity]) -> DatabaseResult<u64>;

    /// Overwrite every column of an existing identity
    ///
    /// # Errors
    ///
    /// * `DatabaseError::NotFound` - No row with this id
    async fn update(&self, identity: &Identity) -> DatabaseResult<()>;

    /// Remove an identity, returning whether a row was deleted
    async fn delete(&self, id: IdentityId) -> DatabaseResult<bool>;

    async fn count(&self) -> DatabaseResult<u64>;

    async fn get_all(&self) -> DatabaseResult<Vec<Identity>>;

    /// Create the canonical table if absent and check the live columns
    ///
    /// # Errors
    ///
    /// * `DatabaseError::Schema` - Canonical columns are missing
    async fn validate_schema(&self) -> DatabaseResult<()>;
}

/// Prepared SQL text for one dialect and table
struct Statements {
    by_id: String,
    by_name: String,
    by_premium_id: String,
    by_address: String,
    insert: String,
    update: String,
    delete: String,
    count: String,
    all: String,
}

impl Statements {
    fn new(dialect: &dyn Dialect, table: &str) -> Self {
        let columns = IDENTITY_COLUMNS.join(", ");
        let select = format!("SELECT {columns} FROM {table}");
        let p1 = dialect.placeholder(1);

        let assignments = IDENTITY_COLUMNS[1..]
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = {}", dialect.placeholder(i + 1)))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            by_id: format!("{select} WHERE id = {p1}"),
            by_name: format!("{select} WHERE LOWER(last_nickname) = LOWER({p1})"),
            by_premium_id: format!("{select} WHERE premium_id = {p1}"),
            by_address: format!("{select} WHERE ip = {p1}"),
            insert: format!(
                "INSERT INTO {table} ({columns}) VALUES ({})",
                dialect.placeholders(1, IDENTITY_COLUMNS.len())
            ),
            update: format!(
                "UPDATE {table} SET {assignments} WHERE id = {}",
                dialect.placeholder(IDENTITY_COLUMNS.len())
            ),
            delete: format!("DELETE FROM {table} WHERE id = {p1}"),
            count: format!("SELECT COUNT(*) FROM {table}"),
            all: select,
        }
    }
}

/// Bind every column of an [`IdentityRow`] in canonical order
macro_rules! bind_row {
    ($query:expr, $row:expr) => {
        $query
            .bind(&$row.id)
            .bind(&$row.premium_id)
            .bind(&$row.password_hash)
            .bind(&$row.password_salt)
            .bind(&$row.password_algo)
            .bind(&$row.last_nickname)
            .bind(&$row.join_date)
            .bind(&$row.last_seen)
            .bind(&$row.secret)
            .bind(&$row.ip)
            .bind(&$row.last_authentication)
            .bind(&$row.last_server)
            .bind(&$row.email)
    };
}

/// [`IdentityStore`] over any backend the [`Connector`] supports
pub struct SqlIdentityStore {
    connector: Arc<Connector>,
    dialect: Box<dyn Dialect>,
    table: String,
    statements: Statements,
}

impl SqlIdentityStore {
    /// Store over the canonical table
    pub fn new(connector: Arc<Connector>) -> Self {
        Self::with_table(connector, IDENTITY_TABLE)
    }

    /// Store over a differently named table
    pub fn with_table(connector: Arc<Connector>, table: &str) -> Self {
        let dialect = dialect_for(connector.kind());
        let statements = Statements::new(dialect.as_ref(), table);
        Self {
            connector,
            dialect,
            table: table.to_string(),
            statements,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    async fn fetch_optional(&self, sql: &str, key: String) -> DatabaseResult<Option<Identity>> {
        let mut conn = self.connector.acquire().await?;
        let row: Option<IdentityRow> = with_connection!(&mut conn, c => {
            sqlx::query_as::<_, IdentityRow>(sql).bind(&key).fetch_optional(c).await
        })
        .map_err(|e| self.connector.classify(e))?;

        row.map(Identity::try_from).transpose()
    }

    async fn fetch_all(&self, sql: &str, key: Option<String>) -> DatabaseResult<Vec<Identity>> {
        let mut conn = self.connector.acquire().await?;
        let rows: Vec<IdentityRow> = with_connection!(&mut conn, c => {
            let query = sqlx::query_as::<_, IdentityRow>(sql);
            match &key {
                Some(key) => query.bind(key).fetch_all(c).await,
                None => query.fetch_all(c).await,
            }
        })
        .map_err(|e| self.connector.classify(e))?;

        rows.into_iter().map(Identity::try_from).collect()
    }

    async fn live_columns(&self) -> DatabaseResult<Vec<String>> {
        let sql = self.dialect.list_columns();
        let mut conn = self.connector.acquire().await?;
        with_connection!(&mut conn, c => {
            sqlx::query_scalar::<_, String>(sql).bind(&self.table).fetch_all(c).await
        })
        .map_err(|e| self.connector.classify(e))
    }
}

#[async_trait]
impl IdentityStore for SqlIdentityStore {
    fn store_id(&self) -> String {
        format!("gatekeep-{}", self.connector.kind())
    }

    async fn get_by_id(&self, id: IdentityId) -> DatabaseResult<Option<Identity>> {
        self.fetch_optional(&self.statements.by_id, id.hyphenated().to_string())
            .await
    }

    async fn get_by_name(&self, name: &str) -> DatabaseResult<Option<Identity>> {
        self.fetch_optional(&self.statements.by_name, name.to_string())
            .await
    }

    async fn get_by_premium_id(&self, premium_id: IdentityId) -> DatabaseResult<Option<Identity>> {
        self.fetch_optional(
            &self.statements.by_premium_id,
            premium_id.hyphenated().to_string(),
        )
        .await
    }

    async fn get_by_address(&self, ip: &str) -> DatabaseResult<HashSet<Identity>> {
        let identities = self
            .fetch_all(&self.statements.by_address, Some(ip.to_string()))
            .await?;
        Ok(identities.into_iter().collect())
    }

    async fn insert(&self, identity: &Identity) -> DatabaseResult<()> {
        let row = IdentityRow::from(identity);
        let sql = self.statements.insert.as_str();
        let mut conn = self.connector.acquire().await?;

        with_connection!(&mut conn, c => {
            bind_row!(sqlx::query(sql), row).execute(c).await.map(|_| ())
        })
        .map_err(|e| self.connector.classify(e))
    }

    async fn insert_many(&self, identities: &[Identity]) -> DatabaseResult<u64> {
        if identities.is_empty() {
            return Ok(0);
        }

        let width = IDENTITY_COLUMNS.len();
        let chunk_rows = (self.dialect.max_bind_params() / width).clamp(1, MAX_ROWS_PER_INSERT);
        let rows: Vec<IdentityRow> = identities.iter().map(IdentityRow::from).collect();
        let mut conn = self.connector.acquire().await?;

        let inserted = with_connection!(&mut conn, c => {
            async {
                let mut tx = c.begin().await?;
                let mut inserted = 0u64;
                for chunk in rows.chunks(chunk_rows) {
                    let sql = self.dialect.insert_ignore(&self.table, &IDENTITY_COLUMNS, chunk.len());
                    let mut query = sqlx::query(&sql);
                    for row in chunk {
                        query = bind_row!(query, row);
                    }
                    inserted += query.execute(&mut *tx).await?.rows_affected();
                }
                tx.commit().await?;
                Ok::<u64, sqlx::Error>(inserted)
            }
            .await
        })
        .map_err(|e| self.connector.classify(e))?;

        log::debug!(
            "Bulk insert into {}: {} of {} rows new",
            self.table,
            inserted,
            identities.len()
        );
        Ok(inserted)
    }

    async fn update(&self, identity: &Identity) -> DatabaseResult<()> {
        let row = IdentityRow::from(identity);
        let sql = self.statements.update.as_str();
        let mut conn = self.connector.acquire().await?;

        let affected = with_connection!(&mut conn, c => {
            sqlx::query(sql)
                .bind(&row.premium_id)
                .bind(&row.password_hash)
                .bind(&row.password_salt)
                .bind(&row.password_algo)
                .bind(&row.last_nickname)
                .bind(&row.join_date)
                .bind(&row.last_seen)
                .bind(&row.secret)
                .bind(&row.ip)
                .bind(&row.last_authentication)
                .bind(&row.last_server)
                .bind(&row.email)
                .bind(&row.id)
                .execute(c)
                .await
                .map(|r| r.rows_affected())
        })
        .map_err(|e| self.connector.classify(e))?;

        // MySQL reports 0 affected rows when nothing changed, so confirm
        // the row exists before calling it missing
        if affected == 0 && self.get_by_id(identity.id).await?.is_none() {
            return Err(DatabaseError::NotFound(identity.id));
        }

        Ok(())
    }

    async fn delete(&self, id: IdentityId) -> DatabaseResult<bool> {
        let key = id.hyphenated().to_string();
        let sql = self.statements.delete.as_str();
        let mut conn = self.connector.acquire().await?;

        let affected = with_connection!(&mut conn, c => {
            sqlx::query(sql).bind(&key).execute(c).await.map(|r| r.rows_affected())
        })
        .map_err(|e| self.connector.classify(e))?;

        Ok(affected > 0)
    }

    async fn count(&self) -> DatabaseResult<u64> {
        let sql = self.statements.count.as_str();
        let mut conn = self.connector.acquire().await?;

        let count = with_connection!(&mut conn, c => {
            sqlx::query_scalar::<_, i64>(sql).fetch_one(c).await
        })
        .map_err(|e| self.connector.classify(e))?;

        Ok(count.max(0) as u64)
    }

    async fn get_all(&self) -> DatabaseResult<Vec<Identity>> {
        self.fetch_all(&self.statements.all, None).await
    }

    async fn validate_schema(&self) -> DatabaseResult<()> {
        let statements = self.dialect.create_table(&self.table);
        {
            let mut conn = self.connector.acquire().await?;
            for sql in &statements {
                with_connection!(&mut conn, c => {
                    sqlx::query(sql).execute(c).await.map(|_| ())
                })
                .map_err(|e| self.connector.classify(e))?;
            }
        }

        let live: HashSet<String> = self
            .live_columns()
            .await?
            .into_iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let missing: Vec<String> = IDENTITY_COLUMNS
            .iter()
            .filter(|c| !live.contains(**c))
            .map(|c| c.to_string())
            .collect();

        if !missing.is_empty() {
            log::error!("Table {} is missing columns {:?}", self.table, missing);
            return Err(DatabaseError::Schema {
                table: self.table.clone(),
                missing,
            });
        }

        let mut extra: Vec<&String> = live
            .iter()
            .filter(|c| !IDENTITY_COLUMNS.contains(&c.as_str()))
            .collect();
        if !extra.is_empty() {
            extra.sort();
            log::warn!("Table {} has unknown columns {:?}, ignoring them", self.table, extra);
        }

        Ok(())
    }
}
