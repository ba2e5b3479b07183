//! The store set backing the cache manager.
//!
//! A `CacheStorage` holds any number of named stores, each a map from
//! [`RequestKey`] to [`CachedResponse`]. Writes are atomic per key and last
//! write wins; there is no locking across keys.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::net::CachedResponse;

use super::{CachedData, EntryInfo, RequestKey, StorageError, StorageResult};

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create `store` if it does not exist yet.
    async fn open(&self, store: &str) -> StorageResult<()>;

    /// Names of all stores, sorted.
    async fn keys(&self) -> StorageResult<Vec<String>>;

    /// Remove `store` and everything in it. Returns false if it did not exist.
    async fn delete(&self, store: &str) -> StorageResult<bool>;

    /// Look up `key`. A missing store is a miss, not an error.
    async fn lookup(&self, store: &str, key: &RequestKey) -> StorageResult<Option<CachedResponse>>;

    /// Write `response` under `key`, replacing any previous entry.
    ///
    /// Fails with [`StorageError::NoSuchStore`] if `store` was never opened or
    /// has been deleted.
    async fn put(&self, store: &str, key: &RequestKey, response: &CachedResponse) -> StorageResult<()>;

    /// Record that `store` holds a complete manifest population.
    async fn seal(&self, store: &str) -> StorageResult<()>;

    async fn is_sealed(&self, store: &str) -> StorageResult<bool>;

    /// Summaries of every entry in `store`, sorted by key.
    async fn entries(&self, store: &str) -> StorageResult<Vec<EntryInfo>>;

    /// Store recorded as current by the last activation, if any.
    async fn current(&self) -> StorageResult<Option<String>>;

    /// Durably record `store` as current. `store` must exist.
    async fn set_current(&self, store: &str) -> StorageResult<()>;
}

#[derive(Debug, Default)]
struct MemStore {
    entries: HashMap<RequestKey, CachedData<CachedResponse>>,
    sealed: bool,
}

/// Process-local [`CacheStorage`]. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: RwLock<HashMap<String, MemStore>>,
    current: RwLock<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, store: &str) -> StorageResult<()> {
        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_default();
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.stores.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, store: &str) -> StorageResult<bool> {
        Ok(self.stores.write().await.remove(store).is_some())
    }

    async fn lookup(&self, store: &str, key: &RequestKey) -> StorageResult<Option<CachedResponse>> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .and_then(|s| s.entries.get(key))
            .map(|cached| cached.data.clone()))
    }

    async fn put(&self, store: &str, key: &RequestKey, response: &CachedResponse) -> StorageResult<()> {
        let mut stores = self.stores.write().await;
        let target = stores
            .get_mut(store)
            .ok_or_else(|| StorageError::NoSuchStore(store.to_string()))?;
        target
            .entries
            .insert(key.clone(), CachedData::new(response.clone()));
        Ok(())
    }

    async fn seal(&self, store: &str) -> StorageResult<()> {
        let mut stores = self.stores.write().await;
        let target = stores
            .get_mut(store)
            .ok_or_else(|| StorageError::NoSuchStore(store.to_string()))?;
        target.sealed = true;
        Ok(())
    }

    async fn is_sealed(&self, store: &str) -> StorageResult<bool> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .map(|s| s.sealed)
            .unwrap_or(false))
    }

    async fn entries(&self, store: &str) -> StorageResult<Vec<EntryInfo>> {
        let stores = self.stores.read().await;
        let target = stores
            .get(store)
            .ok_or_else(|| StorageError::NoSuchStore(store.to_string()))?;
        let mut infos: Vec<EntryInfo> = target
            .entries
            .iter()
            .map(|(key, cached)| EntryInfo {
                key: key.clone(),
                status: cached.data.status,
                size: cached.data.body.len(),
                cached_at: cached.cached_at,
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(infos)
    }

    async fn current(&self) -> StorageResult<Option<String>> {
        Ok(self.current.read().await.clone())
    }

    async fn set_current(&self, store: &str) -> StorageResult<()> {
        if !self.stores.read().await.contains_key(store) {
            return Err(StorageError::NoSuchStore(store.to_string()));
        }
        *self.current.write().await = Some(store.to_string());
        Ok(())
    }
}
