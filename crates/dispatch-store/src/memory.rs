//! In-memory state store (process lifetime only).

use crate::key::check_key;
use dispatch_types::{StateStore, StateStoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory StateStore: sorted map from key to bytes.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        check_key(key)?;
        let guard = self.entries.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StateStoreError> {
        check_key(key)?;
        let mut guard = self.entries.write().await;
        guard.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StateStoreError> {
        let guard = self.entries.read().await;
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize, StateStoreError> {
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|k, _| !k.starts_with(prefix));
        Ok(before - guard.len())
    }
}
