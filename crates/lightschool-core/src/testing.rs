//! Test doubles for the network and storage seams.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use crate::cache::{
    CacheStorage, EntryInfo, MemoryStorage, RequestKey, StorageError, StorageResult,
};
use crate::net::{CacheRequest, CachedResponse, FetchError, FetchResult, Fetcher};

enum Scripted {
    Respond(CachedResponse),
    Fail,
}

/// `Fetcher` answering from a script and counting calls per URL.
/// Unscripted URLs fail like an unreachable host.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<CacheRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: Url, status: u16, body: impl Into<String>) {
        self.respond_with(url, CachedResponse::new(status, body.into()));
    }

    pub fn respond_with(&self, url: Url, response: CachedResponse) {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Respond(response));
    }

    pub fn fail(&self, url: Url) {
        self.script.lock().unwrap().insert(url.to_string(), Scripted::Fail);
    }

    pub fn calls(&self, url: &Url) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(url.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<CacheRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &CacheRequest) -> FetchResult<CachedResponse> {
        let url = request.url.to_string();
        *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;
        self.requests.lock().unwrap().push(request.clone());

        match self.script.lock().unwrap().get(&url) {
            Some(Scripted::Respond(response)) => Ok(response.clone()),
            Some(Scripted::Fail) => Err(FetchError::Network(format!("scripted failure for {}", url))),
            None => Err(FetchError::Connect(format!("no route to {}", url))),
        }
    }
}

/// `Fetcher` that holds requests for one URL until released.
pub struct GatedFetcher {
    inner: Arc<ScriptedFetcher>,
    gated: Url,
    entered: Notify,
    release: Notify,
}

impl GatedFetcher {
    pub fn new(inner: Arc<ScriptedFetcher>, gated: Url) -> Self {
        Self {
            inner,
            gated,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Resolves once a request for the gated URL is waiting.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, request: &CacheRequest) -> FetchResult<CachedResponse> {
        if request.url == self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.fetch(request).await
    }
}

fn locked(store: &str) -> StorageError {
    StorageError::io(
        store,
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "store is locked"),
    )
}

/// Storage whose deletes or writes fail for chosen stores.
pub struct FlakyStorage {
    inner: Arc<MemoryStorage>,
    undeletable: HashSet<String>,
    unwritable: HashSet<String>,
    unsealable: HashSet<String>,
}

impl FlakyStorage {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            undeletable: HashSet::new(),
            unwritable: HashSet::new(),
            unsealable: HashSet::new(),
        }
    }

    pub fn failing_delete(mut self, stores: &[&str]) -> Self {
        self.undeletable.extend(stores.iter().map(|s| s.to_string()));
        self
    }

    pub fn failing_put(mut self, stores: &[&str]) -> Self {
        self.unwritable.extend(stores.iter().map(|s| s.to_string()));
        self
    }

    pub fn failing_seal(mut self, stores: &[&str]) -> Self {
        self.unsealable.extend(stores.iter().map(|s| s.to_string()));
        self
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, store: &str) -> StorageResult<()> {
        self.inner.open(store).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete(&self, store: &str) -> StorageResult<bool> {
        if self.undeletable.contains(store) {
            return Err(locked(store));
        }
        self.inner.delete(store).await
    }

    async fn lookup(&self, store: &str, key: &RequestKey) -> StorageResult<Option<CachedResponse>> {
        self.inner.lookup(store, key).await
    }

    async fn put(&self, store: &str, key: &RequestKey, response: &CachedResponse) -> StorageResult<()> {
        if self.unwritable.contains(store) {
            return Err(locked(store));
        }
        self.inner.put(store, key, response).await
    }

    async fn seal(&self, store: &str) -> StorageResult<()> {
        if self.unsealable.contains(store) {
            return Err(locked(store));
        }
        self.inner.seal(store).await
    }

    async fn is_sealed(&self, store: &str) -> StorageResult<bool> {
        self.inner.is_sealed(store).await
    }

    async fn entries(&self, store: &str) -> StorageResult<Vec<EntryInfo>> {
        self.inner.entries(store).await
    }

    async fn current(&self) -> StorageResult<Option<String>> {
        self.inner.current().await
    }

    async fn set_current(&self, store: &str) -> StorageResult<()> {
        self.inner.set_current(store).await
    }
}
