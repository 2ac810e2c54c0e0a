//! In-memory document store used by tests and local runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{DocumentStore, StoreError};

/// A [`DocumentStore`] held entirely in process memory.
///
/// Namespaces are created lazily on `put` as well as via
/// `ensure_namespace`, so tests don't need a setup step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, Vec<u8>>>> {
        self.namespaces
            .lock()
            .expect("memory store mutex poisoned")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<(), StoreError> {
        let mut namespaces = self.lock();
        let documents = namespaces.entry(namespace.to_string()).or_default();

        if !overwrite && documents.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }

        documents.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .lock()
            .get(namespace)
            .and_then(|documents| documents.get(key))
            .cloned())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        if let Some(documents) = self.lock().get_mut(namespace) {
            documents.remove(key);
        }
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .get(namespace)
            .map(|documents| documents.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        self.lock().entry(namespace.to_string()).or_default();
        Ok(())
    }
}
