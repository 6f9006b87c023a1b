//! Persistent key-value backend trait.

use async_trait::async_trait;

use crate::error::MemoryError;

/// A persistent key-value store behind the short-term cache.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Short backend name for logs and errors.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError>;

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), MemoryError>;

    /// Remove a key. Returns true if it existed.
    async fn delete(&self, key: &str) -> Result<bool, MemoryError>;
}
