//! Memory collaborator: short-term cache in front of an optional persistent
//! backend.

pub mod backend;
pub mod json_file;
pub mod libsql_backend;

pub use backend::MemoryBackend;
pub use json_file::JsonFileBackend;
pub use libsql_backend::LibSqlBackend;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{MemoryBackendKind, MemoryConfig};
use crate::error::MemoryError;

/// Cache-first key-value store shared by the controller and every agent.
pub struct MemoryStore {
    short_term: RwLock<HashMap<String, serde_json::Value>>,
    backend: Option<Arc<dyn MemoryBackend>>,
}

impl MemoryStore {
    /// A store with no persistent backend.
    pub fn short_term_only() -> Self {
        Self {
            short_term: RwLock::new(HashMap::new()),
            backend: None,
        }
    }

    pub fn with_backend(backend: Arc<dyn MemoryBackend>) -> Self {
        Self {
            short_term: RwLock::new(HashMap::new()),
            backend: Some(backend),
        }
    }

    /// Build the store described by configuration.
    pub async fn from_config(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let store = match config.backend {
            MemoryBackendKind::ShortTermOnly => Self::short_term_only(),
            MemoryBackendKind::JsonFile => {
                Self::with_backend(Arc::new(JsonFileBackend::open(&config.json_file.path).await?))
            }
            MemoryBackendKind::Libsql => {
                Self::with_backend(Arc::new(LibSqlBackend::new_local(&config.libsql.path).await?))
            }
        };
        info!(
            backend = store.backend_name().unwrap_or("none"),
            "Memory store initialized"
        );
        Ok(store)
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Write to the cache, and to the backend when `persist` is set.
    pub async fn store(
        &self,
        key: &str,
        value: serde_json::Value,
        persist: bool,
    ) -> Result<(), MemoryError> {
        if persist && let Some(backend) = &self.backend {
            backend.set(key, &value).await.inspect_err(|e| {
                warn!(key, backend = backend.name(), error = %e, "Persistent store failed");
            })?;
        }
        self.short_term.write().await.insert(key.to_string(), value);
        debug!(key, persist, "Stored");
        Ok(())
    }

    /// Read from the cache; on a miss optionally fall back to the backend and
    /// warm the cache with what it returns.
    ///
    /// Backend failures are logged and reported as a miss.
    pub async fn retrieve(&self, key: &str, fallback_to_persistent: bool) -> Option<serde_json::Value> {
        if let Some(value) = self.short_term.read().await.get(key) {
            return Some(value.clone());
        }
        if !fallback_to_persistent {
            return None;
        }
        let backend = self.backend.as_ref()?;
        match backend.get(key).await {
            Ok(Some(value)) => {
                self.short_term
                    .write()
                    .await
                    .insert(key.to_string(), value.clone());
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, backend = backend.name(), error = %e, "Persistent retrieve failed");
                None
            }
        }
    }

    /// Remove a key from both layers. True if either held it.
    pub async fn delete(&self, key: &str) -> bool {
        let cached = self.short_term.write().await.remove(key).is_some();
        let persisted = match &self.backend {
            Some(backend) => match backend.delete(key).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(key, backend = backend.name(), error = %e, "Persistent delete failed");
                    false
                }
            },
            None => false,
        };
        cached || persisted
    }
}
