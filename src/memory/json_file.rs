//! Whole-map JSON file backend.
//!
//! The file is loaded once on open and rewritten after every mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::backend::MemoryBackend;
use crate::error::MemoryError;

pub struct JsonFileBackend {
    path: PathBuf,
    data: Mutex<HashMap<String, serde_json::Value>>,
}

impl JsonFileBackend {
    /// Open the file, starting empty if it is missing or unreadable.
    pub async fn open(path: &Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = match tokio::fs::read_to_string(path).await {
            Ok(raw) if raw.trim().is_empty() => HashMap::new(),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Memory file unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = data.len(), "JSON memory backend opened");
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }

    async fn flush(&self, data: &HashMap<String, serde_json::Value>) -> Result<(), MemoryError> {
        let raw = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "json_file"
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), MemoryError> {
        let mut data = self.data.lock().await;
        data.insert(key.to_string(), value.clone());
        self.flush(&data).await
    }

    async fn delete(&self, key: &str) -> Result<bool, MemoryError> {
        let mut data = self.data.lock().await;
        if data.remove(key).is_none() {
            return Ok(false);
        }
        self.flush(&data).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.json");

        let backend = JsonFileBackend::open(&path).await.unwrap();
        backend.set("k", &json!({"a": 1})).await.unwrap();
        drop(backend);

        let reopened = JsonFileBackend::open(&path).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(json!({"a": 1})));
        assert!(reopened.delete("k").await.unwrap());
        assert!(!reopened.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.json");
        std::fs::write(&path, "{not json").unwrap();

        let backend = JsonFileBackend::open(&path).await.unwrap();
        assert_eq!(backend.get("anything").await.unwrap(), None);
    }
}
