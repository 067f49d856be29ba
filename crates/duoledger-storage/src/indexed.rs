//! Async-indexed tier: a SQLite kv table.
//!
//! The connection lives behind an `Arc<Mutex<>>` and every operation is
//! dispatched with `tokio::task::spawn_blocking`, so access always suspends
//! the caller — this is the slowest tier and the recovery source of last
//! resort.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::tier::{SessionTier, TierKind};

/// SQLite-backed key-value tier.
#[derive(Clone)]
pub struct IndexedTier {
    conn: Arc<Mutex<Connection>>,
}

impl IndexedTier {
    /// Open (or create) the tier database at `path`.
    ///
    /// Applies pragmas and creates the kv table. Blocks briefly on file
    /// I/O; call during startup.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening indexed tier database");
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory tier — useful for tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        debug!("opening in-memory indexed tier");
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply pragmas and create the schema on a fresh connection.
    fn init(conn: &Connection) -> StorageResult<()> {
        // WAL mode: concurrent readers, non-blocking writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // NORMAL sync is safe with WAL for this data — losing the last
        // heartbeat on power failure only shortens the session.
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Busy timeout so a concurrent context waits instead of failing.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Run a closure against the connection on the blocking pool.
    async fn execute<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StorageError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl SessionTier for IndexedTier {
    fn kind(&self) -> TierKind {
        TierKind::Indexed
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let result = conn.query_row(
                "SELECT value FROM session_kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(StorageError::Sqlite(e)),
            }
        })
        .await
    }

    async fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(key = %key, "indexed_tier.put");
        let key = key.to_string();
        let value = value.to_string();
        let now = Utc::now().timestamp();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO session_kv (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!(key = %key, "indexed_tier.delete");
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM session_kv WHERE key = ?1",
                rusqlite::params![key],
            )?;
            Ok(())
        })
        .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let tier = IndexedTier::open_in_memory().unwrap();

        assert_eq!(tier.get("session").await.unwrap(), None);

        tier.put("session", "v1").await.unwrap();
        assert_eq!(tier.get("session").await.unwrap().as_deref(), Some("v1"));

        // Upsert replaces.
        tier.put("session", "v2").await.unwrap();
        assert_eq!(tier.get("session").await.unwrap().as_deref(), Some("v2"));

        tier.delete("session").await.unwrap();
        assert_eq!(tier.get("session").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_absent_key_is_ok() {
        let tier = IndexedTier::open_in_memory().unwrap();
        tier.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tier.db");
        {
            let tier = IndexedTier::open(&path).unwrap();
            tier.put("session", "persisted").await.unwrap();
        }
        let tier = IndexedTier::open(&path).unwrap();
        assert_eq!(
            tier.get("session").await.unwrap().as_deref(),
            Some("persisted")
        );
    }
}
