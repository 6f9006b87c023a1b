//! libSQL key-value backend.
//!
//! One `kv` table, values stored as JSON text. Supports local file and
//! in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use super::backend::MemoryBackend;
use crate::error::MemoryError;

const BACKEND: &str = "libsql";

fn backend_err(context: &str, e: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend {
        backend: BACKEND.to_string(),
        reason: format!("{context}: {e}"),
    }
}

pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| backend_err("open database", e))?;
        let backend = Self::from_db(db).await?;
        info!(path = %path.display(), "libSQL memory backend opened");
        Ok(backend)
    }

    /// Create an in-memory database.
    pub async fn new_memory() -> Result<Self, MemoryError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| backend_err("create in-memory database", e))?;
        Self::from_db(db).await
    }

    async fn from_db(db: LibSqlDatabase) -> Result<Self, MemoryError> {
        let conn = db.connect().map_err(|e| backend_err("connect", e))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .await
        .map_err(|e| backend_err("init schema", e))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl MemoryBackend for LibSqlBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv WHERE key = ?1", params![key])
            .await
            .map_err(|e| backend_err("get", e))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row.get(0).map_err(|e| backend_err("get row", e))?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(backend_err("get", e)),
        }
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), MemoryError> {
        let raw = serde_json::to_string(value)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, raw, now],
            )
            .await
            .map_err(|e| backend_err("set", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, MemoryError> {
        let affected = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .await
            .map_err(|e| backend_err("delete", e))?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_overwrite_delete() {
        let backend = LibSqlBackend::new_memory().await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);

        backend.set("k", &json!("one")).await.unwrap();
        backend.set("k", &json!({"two": 2})).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(json!({"two": 2})));

        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn local_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mem.db");
        {
            let backend = LibSqlBackend::new_local(&path).await.unwrap();
            backend.set("answer", &json!(42)).await.unwrap();
        }
        let backend = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(backend.get("answer").await.unwrap(), Some(json!(42)));
    }
}
