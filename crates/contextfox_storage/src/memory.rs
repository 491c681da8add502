//! In-memory storage backend.

use async_trait::async_trait;
use contextfox_error::ContextFoxResult;
use contextfox_interface::KeyValueStore;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// A [`KeyValueStore`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> ContextFoxResult<Option<String>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ContextFoxResult<()> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> ContextFoxResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> ContextFoxResult<Vec<String>> {
        Ok(self
            .data
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
