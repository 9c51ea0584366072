//! SQLite-backed state store, for deployments where workers share a database
//! file instead of a scratch directory.

use crate::key::check_key;
use async_trait::async_trait;
use dispatch_types::{StateStore, StateStoreError};
use std::path::Path;

pub struct SqliteStateStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the store at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| StateStoreError::Other(e.to_string()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StateStoreError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| StateStoreError::Other(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self, StateStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_state (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StateStoreError::Other(e.to_string()))?;

        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StateStoreError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StateStoreError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(|e| StateStoreError::Other(e.to_string()))
    }
}

/// LIKE pattern matching keys that start with `prefix`.
fn like_prefix(prefix: &str) -> String {
    let mut pat = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pat.push('\\');
        }
        pat.push(c);
    }
    pat.push('%');
    pat
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        check_key(key)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT value FROM job_state WHERE key = ?1")?;
            let result = stmt.query_row([key], |row| row.get::<_, Vec<u8>>(0));
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StateStoreError> {
        check_key(key)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO job_state (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, now],
            )?;
            Ok(())
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StateStoreError> {
        let pattern = like_prefix(prefix);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM job_state WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
            )?;
            let rows = stmt.query_map(rusqlite::params![pattern], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for key in rows {
                out.push(key?);
            }
            Ok(out)
        })
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize, StateStoreError> {
        let pattern = like_prefix(prefix);
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM job_state WHERE key LIKE ?1 ESCAPE '\\'",
                rusqlite::params![pattern],
            )
        })
    }
}
