//! SQL differences between the supported backends.

use super::config::BackendKind;

/// Canonical columns in storage order
pub const IDENTITY_COLUMNS: [&str; 13] = [
    "id",
    "premium_id",
    "password_hash",
    "password_salt",
    "password_algo",
    "last_nickname",
    "join_date",
    "last_seen",
    "secret",
    "ip",
    "last_authentication",
    "last_server",
    "email",
];

/// Backend-specific SQL rendering
pub trait Dialect: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Bind marker for the 1-based parameter `index`
    fn placeholder(&self, index: usize) -> String;

    /// Largest number of bind parameters one statement may carry
    fn max_bind_params(&self) -> usize;

    /// Multi-row insert that silently skips rows hitting a unique key
    fn insert_ignore(&self, table: &str, columns: &[&str], rows: usize) -> String;

    /// Statements creating the canonical table and its constraints
    fn create_table(&self, table: &str) -> Vec<String>;

    /// Query returning the live column names of `table` in its first column,
    /// taking the table name as its only parameter
    fn list_columns(&self) -> &'static str;

    /// Quote a table or column name
    fn quote_ident(&self, name: &str) -> String {
        format!("\"{name}\"")
    }

    /// Comma-separated placeholders for `count` values starting at `first`
    fn placeholders(&self, first: usize, count: usize) -> String {
        (first..first + count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `VALUES` body for `rows` tuples of `columns` width
    fn value_tuples(&self, columns: usize, rows: usize) -> String {
        (0..rows)
            .map(|row| format!("({})", self.placeholders(row * columns + 1, columns)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn kind(&self) -> BackendKind {
        BackendKind::MySql
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn max_bind_params(&self) -> usize {
        65_535
    }

    fn insert_ignore(&self, table: &str, columns: &[&str], rows: usize) -> String {
        format!(
            "INSERT IGNORE INTO {table} ({}) VALUES {}",
            columns.join(", "),
            self.value_tuples(columns.len(), rows)
        )
    }

    // The default collation compares case-insensitively, so a plain UNIQUE
    // on last_nickname is enough
    fn create_table(&self, table: &str) -> Vec<String> {
        vec![format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id VARCHAR(36) NOT NULL PRIMARY KEY,
                premium_id VARCHAR(36) NULL UNIQUE,
                password_hash VARCHAR(512) NULL,
                password_salt VARCHAR(255) NULL,
                password_algo VARCHAR(64) NULL,
                last_nickname VARCHAR(255) NOT NULL UNIQUE,
                join_date DATETIME NULL,
                last_seen DATETIME NULL,
                secret VARCHAR(255) NULL,
                ip VARCHAR(64) NULL,
                last_authentication DATETIME NULL,
                last_server VARCHAR(255) NULL,
                email VARCHAR(255) NULL
            )"#
        )]
    }

    fn list_columns(&self) -> &'static str {
        "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{name}`")
    }
}

pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn max_bind_params(&self) -> usize {
        65_535
    }

    fn insert_ignore(&self, table: &str, columns: &[&str], rows: usize) -> String {
        format!(
            "INSERT INTO {table} ({}) VALUES {} ON CONFLICT DO NOTHING",
            columns.join(", "),
            self.value_tuples(columns.len(), rows)
        )
    }

    fn create_table(&self, table: &str) -> Vec<String> {
        vec![
            format!(
                r#"CREATE TABLE IF NOT EXISTS {table} (
                    id VARCHAR(36) NOT NULL PRIMARY KEY,
                    premium_id VARCHAR(36) NULL UNIQUE,
                    password_hash VARCHAR(512) NULL,
                    password_salt VARCHAR(255) NULL,
                    password_algo VARCHAR(64) NULL,
                    last_nickname VARCHAR(255) NOT NULL,
                    join_date TIMESTAMP NULL,
                    last_seen TIMESTAMP NULL,
                    secret VARCHAR(255) NULL,
                    ip VARCHAR(64) NULL,
                    last_authentication TIMESTAMP NULL,
                    last_server VARCHAR(255) NULL,
                    email VARCHAR(255) NULL
                )"#
            ),
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {table}_nickname_ci ON {table} (LOWER(last_nickname))"
            ),
        ]
    }

    fn list_columns(&self) -> &'static str {
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1"
    }
}

pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn max_bind_params(&self) -> usize {
        32_766
    }

    fn insert_ignore(&self, table: &str, columns: &[&str], rows: usize) -> String {
        format!(
            "INSERT OR IGNORE INTO {table} ({}) VALUES {}",
            columns.join(", "),
            self.value_tuples(columns.len(), rows)
        )
    }

    fn create_table(&self, table: &str) -> Vec<String> {
        vec![format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id TEXT NOT NULL PRIMARY KEY,
                premium_id TEXT NULL UNIQUE,
                password_hash TEXT NULL,
                password_salt TEXT NULL,
                password_algo TEXT NULL,
                last_nickname TEXT NOT NULL UNIQUE COLLATE NOCASE,
                join_date DATETIME NULL,
                last_seen DATETIME NULL,
                secret TEXT NULL,
                ip TEXT NULL,
                last_authentication DATETIME NULL,
                last_server TEXT NULL,
                email TEXT NULL
            )"#
        )]
    }

    fn list_columns(&self) -> &'static str {
        "SELECT name FROM pragma_table_info(?)"
    }
}

/// Dialect for a backend
pub fn dialect_for(kind: BackendKind) -> Box<dyn Dialect> {
    match kind {
        BackendKind::MySql => Box::new(MySqlDialect),
        BackendKind::Postgres => Box::new(PostgresDialect),
        BackendKind::Sqlite => Box::new(SqliteDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_ignore_per_backend() {
        let columns = ["id", "last_nickname"];

        assert_eq!(
            MySqlDialect.insert_ignore("t", &columns, 2),
            "INSERT IGNORE INTO t (id, last_nickname) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(
            PostgresDialect.insert_ignore("t", &columns, 2),
            "INSERT INTO t (id, last_nickname) VALUES ($1, $2), ($3, $4) ON CONFLICT DO NOTHING"
        );
        assert_eq!(
            SqliteDialect.insert_ignore("t", &columns, 1),
            "INSERT OR IGNORE INTO t (id, last_nickname) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(MySqlDialect.quote_ident("AUTH"), "`AUTH`");
        assert_eq!(PostgresDialect.quote_ident("authme"), "\"authme\"");
        assert_eq!(SqliteDialect.quote_ident("nlogin"), "\"nlogin\"");
    }

    #[test]
    fn test_postgres_nickname_index_is_case_insensitive() {
        let statements = PostgresDialect.create_table("gatekeep_identity");
        assert_eq!(statements.len(), 2);
        assert!(statements[1].contains("LOWER(last_nickname)"));
    }

    #[test]
    fn test_create_table_covers_every_column() {
        for kind in BackendKind::ALL {
            let sql = dialect_for(kind).create_table("t").join("\n");
            for column in IDENTITY_COLUMNS {
                assert!(sql.contains(column), "{kind} table lacks {column}");
            }
        }
    }
}
