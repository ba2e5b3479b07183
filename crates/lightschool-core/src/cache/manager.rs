//! The offline cache manager.
//!
//! Fronts every request the client issues with a versioned, persistent
//! cache. Three lifecycle operations drive it:
//!
//! - [`OfflineCacheManager::initialize`] populates a new generation's store
//!   from the manifest, all or nothing.
//! - [`OfflineCacheManager::activate_generation`] makes a populated
//!   generation current and sweeps every other store.
//! - [`OfflineCacheManager::route`] serves a request from the current store
//!   or the network according to the routing table.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::net::{CacheRequest, CachedResponse, Fetcher};

use super::{
    CacheError, CacheStorage, CurrentGeneration, EntryInfo, Generation, GenerationState, Manifest,
    Policy, RequestKey, RoutingTable, StorageError,
};

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct RoutedResponse {
    pub response: CachedResponse,
    pub source: ResponseSource,
    pub policy: Policy,
}

/// Outcome of [`OfflineCacheManager::activate_generation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub current: Generation,
    pub previous: Option<Generation>,
    pub deleted: Vec<String>,
    /// Stores whose deletion failed. They stay superseded.
    pub failed: Vec<String>,
}

/// One store as seen by [`OfflineCacheManager::status`].
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub name: String,
    pub current: bool,
    pub sealed: bool,
    pub entries: Vec<EntryInfo>,
}

pub struct OfflineCacheManager {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    routes: RoutingTable,
    current: CurrentGeneration,
    /// In-flight lifecycle states that storage alone cannot tell apart.
    transitions: Mutex<HashMap<String, GenerationState>>,
}

impl OfflineCacheManager {
    pub fn new(storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>, routes: RoutingTable) -> Self {
        Self {
            storage,
            fetcher,
            routes,
            current: CurrentGeneration::new(),
            transitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn current(&self) -> Option<Generation> {
        self.current.get()
    }

    /// Current in this process, or recorded as current by the storage.
    async fn is_live(&self, generation: &Generation) -> Result<bool, CacheError> {
        if self.current.is_current(generation) {
            return Ok(true);
        }
        Ok(self.storage.current().await?.as_deref() == Some(generation.as_str()))
    }

    async fn set_transition(&self, store: &str, state: Option<GenerationState>) {
        let mut transitions = self.transitions.lock().await;
        match state {
            Some(state) => {
                transitions.insert(store.to_string(), state);
            }
            None => {
                transitions.remove(store);
            }
        }
    }

    // ===== Install =====

    /// Populate `generation`'s store with every resource in `manifest`.
    ///
    /// All resources are fetched before any is written. Any failed fetch,
    /// non-2xx status or failed write aborts the install, discards the store
    /// and leaves the generation absent. On success the store is sealed and
    /// ready, but the current generation is unchanged.
    pub async fn initialize(&self, generation: &Generation, manifest: &Manifest) -> Result<usize, CacheError> {
        if self.is_live(generation).await? {
            return Err(CacheError::AlreadyCurrent(generation.clone()));
        }

        info!(%generation, resources = manifest.len(), "Installing generation");
        self.set_transition(generation.as_str(), Some(GenerationState::Populating))
            .await;

        let result = self.populate(generation, manifest).await;
        self.set_transition(generation.as_str(), None).await;

        match result {
            Ok(count) => {
                info!(%generation, entries = count, "Generation ready");
                Ok(count)
            }
            Err(e) => {
                warn!(%generation, error = %e, "Install failed, discarding store");
                if let Err(cleanup) = self.storage.delete(generation.as_str()).await {
                    warn!(%generation, error = %cleanup, "Failed to discard partial store");
                }
                Err(e)
            }
        }
    }

    async fn populate(&self, generation: &Generation, manifest: &Manifest) -> Result<usize, CacheError> {
        let store = generation.as_str();
        let requests: Vec<CacheRequest> = manifest
            .urls()
            .iter()
            .cloned()
            .map(CacheRequest::get)
            .collect();

        let results = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut fetched = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(results) {
            let response = result.map_err(|source| CacheError::ManifestFetch {
                generation: generation.clone(),
                url: request.url.to_string(),
                source,
            })?;
            if !response.is_ok() {
                return Err(CacheError::ManifestStatus {
                    generation: generation.clone(),
                    url: request.url.to_string(),
                    status: response.status,
                });
            }
            fetched.push((RequestKey::from_request(request), response));
        }

        let store_err = |source: StorageError| CacheError::ManifestStore {
            generation: generation.clone(),
            source,
        };

        // A leftover store from an earlier attempt starts over.
        self.storage.delete(store).await.map_err(store_err)?;
        self.storage.open(store).await.map_err(store_err)?;
        for (key, response) in &fetched {
            self.storage.put(store, key, response).await.map_err(store_err)?;
        }
        self.storage.seal(store).await.map_err(store_err)?;

        Ok(fetched.len())
    }

    // ===== Activate =====

    /// Make `generation` current, then delete every other store.
    ///
    /// The current pointer is recorded in storage and swapped in memory
    /// before the sweep starts. Deletion failures are logged and reported but
    /// never fail the activation.
    pub async fn activate_generation(&self, generation: &Generation) -> Result<ActivationReport, CacheError> {
        if !self.storage.is_sealed(generation.as_str()).await? {
            return Err(CacheError::NotReady(generation.clone()));
        }

        let recorded = self.storage.current().await?;
        self.storage.set_current(generation.as_str()).await?;
        let swapped = self.current.swap(generation.clone());
        self.set_transition(generation.as_str(), None).await;

        let previous = swapped
            .or_else(|| recorded.and_then(|name| Generation::new(name).ok()))
            .filter(|p| p != generation);
        info!(%generation, previous = ?previous.as_ref().map(|g| g.as_str()), "Generation activated");

        let stale: Vec<String> = match self.storage.keys().await {
            Ok(keys) => keys.into_iter().filter(|k| k != generation.as_str()).collect(),
            Err(e) => {
                warn!(error = %e, "Could not list stores for cleanup");
                Vec::new()
            }
        };

        for store in &stale {
            self.set_transition(store, Some(GenerationState::Superseded)).await;
        }

        let outcomes = join_all(stale.iter().map(|store| async move {
            let result = self
                .storage
                .delete(store)
                .await
                .map_err(|source| CacheError::Deletion {
                    store: store.clone(),
                    source,
                });
            (store, result)
        }))
        .await;

        let mut report = ActivationReport {
            current: generation.clone(),
            previous,
            deleted: Vec::new(),
            failed: Vec::new(),
        };
        for (store, outcome) in outcomes {
            match outcome {
                Ok(_) => {
                    debug!(store = %store, "Stale store deleted");
                    self.set_transition(store, None).await;
                    report.deleted.push(store.clone());
                }
                Err(e) => {
                    warn!(error = %e, "Stale store cleanup failed");
                    report.failed.push(store.clone());
                }
            }
        }

        Ok(report)
    }

    /// Load the generation recorded by the last activation, after a restart.
    ///
    /// No sweep runs. Returns `None`, leaving every request on the network,
    /// when nothing was ever activated or the recorded store is incomplete.
    pub async fn resume(&self) -> Result<Option<Generation>, CacheError> {
        let Some(name) = self.storage.current().await? else {
            debug!("No activated generation to resume");
            return Ok(None);
        };
        let generation = Generation::new(name)?;
        if !self.storage.is_sealed(generation.as_str()).await? {
            warn!(%generation, "Recorded generation is not sealed, not resuming");
            return Ok(None);
        }
        self.current.swap(generation.clone());
        info!(%generation, "Generation resumed");
        Ok(Some(generation))
    }

    // ===== Fetch =====

    /// Serve `request` according to the routing table.
    pub async fn route(&self, request: &CacheRequest) -> Result<RoutedResponse, CacheError> {
        let policy = self.routes.resolve(&request.url);
        // One snapshot per request: an activation running concurrently is
        // observed entirely or not at all.
        let current = self.current.get();

        let store = match current {
            Some(ref g) if request.is_get() => g.as_str(),
            _ => {
                let response = self.fetch_network(request).await?;
                return Ok(RoutedResponse {
                    response,
                    source: ResponseSource::Network,
                    policy,
                });
            }
        };

        let key = RequestKey::from_request(request);
        match self.storage.lookup(store, &key).await {
            Ok(Some(response)) => {
                debug!(%key, store, "Cache hit");
                return Ok(RoutedResponse {
                    response,
                    source: ResponseSource::Cache,
                    policy,
                });
            }
            Ok(None) => debug!(%key, store, "Cache miss"),
            Err(e) => warn!(%key, store, error = %e, "Cache lookup failed, using network"),
        }

        let response = self.fetch_network(request).await?;

        if policy == Policy::StaleWhilePopulation {
            if response.is_ok() {
                match self.storage.put(store, &key, &response).await {
                    Ok(()) => debug!(%key, store, "Stored network response"),
                    Err(e) => warn!(%key, store, error = %e, "Failed to store network response"),
                }
            } else {
                debug!(%key, status = response.status, "Not storing error response");
            }
        }

        Ok(RoutedResponse {
            response,
            source: ResponseSource::Network,
            policy,
        })
    }

    async fn fetch_network(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError> {
        self.fetcher
            .fetch(request)
            .await
            .map_err(|source| CacheError::RouteNetwork {
                url: request.url.to_string(),
                source,
            })
    }

    // ===== Inspection =====

    pub async fn state(&self, generation: &Generation) -> Result<GenerationState, CacheError> {
        if let Some(state) = self.transitions.lock().await.get(generation.as_str()) {
            return Ok(*state);
        }
        if self.is_live(generation).await? {
            return Ok(GenerationState::Current);
        }
        if self.storage.is_sealed(generation.as_str()).await? {
            return Ok(GenerationState::ReadyInactive);
        }
        Ok(GenerationState::Absent)
    }

    pub async fn status(&self) -> Result<Vec<StoreStatus>, CacheError> {
        let current = match self.current.get() {
            Some(g) => Some(String::from(g)),
            None => self.storage.current().await?,
        };
        let mut stores = Vec::new();
        for name in self.storage.keys().await? {
            let sealed = self.storage.is_sealed(&name).await?;
            let entries = self.storage.entries(&name).await?;
            stores.push(StoreStatus {
                current: current.as_deref() == Some(name.as_str()),
                name,
                sealed,
                entries,
            });
        }
        Ok(stores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStorage, RoutePattern};
    use crate::cache::ErrorKind;
    use crate::testing::{FlakyStorage, GatedFetcher, ScriptedFetcher};
    use url::Url;

    const ORIGIN: &str = "http://localhost:8000";

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn generation(name: &str) -> Generation {
        Generation::new(name).unwrap()
    }

    fn manifest(paths: &[&str]) -> Manifest {
        Manifest::resolve(&Url::parse(ORIGIN).unwrap(), paths).unwrap()
    }

    fn manager_with(storage: Arc<dyn CacheStorage>, fetcher: Arc<ScriptedFetcher>) -> OfflineCacheManager {
        OfflineCacheManager::new(storage, fetcher, RoutingTable::default())
    }

    fn setup() -> (Arc<MemoryStorage>, Arc<ScriptedFetcher>, OfflineCacheManager) {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(storage.clone(), fetcher.clone());
        (storage, fetcher, manager)
    }

    async fn install_and_activate(manager: &OfflineCacheManager, fetcher: &ScriptedFetcher, name: &str, paths: &[&str]) {
        for path in paths {
            fetcher.respond(url(path), 200, format!("{} {}", name, path));
        }
        let g = generation(name);
        manager.initialize(&g, &manifest(paths)).await.unwrap();
        manager.activate_generation(&g).await.unwrap();
    }

    // ===== Initialize =====

    #[tokio::test]
    async fn test_initialize_populates_store_without_activating() {
        let (storage, fetcher, manager) = setup();
        fetcher.respond(url("/"), 200, "<html>");
        fetcher.respond(url("/a.css"), 200, "body {}");

        let v1 = generation("v1");
        let count = manager.initialize(&v1, &manifest(&["/", "/a.css"])).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(storage.entries("v1").await.unwrap().len(), 2);
        assert!(storage.is_sealed("v1").await.unwrap());
        assert_eq!(manager.current(), None);
        assert_eq!(manager.state(&v1).await.unwrap(), GenerationState::ReadyInactive);
    }

    #[tokio::test]
    async fn test_initialize_failure_leaves_generation_absent() {
        let (storage, fetcher, manager) = setup();
        fetcher.respond(url("/"), 200, "<html>");
        fetcher.fail(url("/a.css"));

        let v1 = generation("v1");
        let err = manager
            .initialize(&v1, &manifest(&["/", "/a.css"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::cache::ErrorKind::Initialization);
        assert!(matches!(err, CacheError::ManifestFetch { ref url, .. } if url.ends_with("/a.css")));
        assert!(storage.keys().await.unwrap().is_empty());
        assert_eq!(manager.state(&v1).await.unwrap(), GenerationState::Absent);
        assert_eq!(manager.current(), None);

        // And it cannot be activated.
        let err = manager.activate_generation(&v1).await.unwrap_err();
        assert!(matches!(err, CacheError::NotReady(_)));
        assert_eq!(manager.current(), None);
    }

    #[tokio::test]
    async fn test_initialize_rejects_error_status() {
        let (storage, fetcher, manager) = setup();
        fetcher.respond(url("/"), 200, "<html>");
        fetcher.respond(url("/static/manifest.json"), 404, "not found");

        let err = manager
            .initialize(&generation("v1"), &manifest(&["/", "/static/manifest.json"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::ManifestStatus { status: 404, .. }));
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_failure_does_not_disturb_current() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/", "/a.css"]).await;

        fetcher.fail(url("/b.css"));
        let v2 = generation("v2");
        assert!(manager.initialize(&v2, &manifest(&["/", "/b.css"])).await.is_err());

        assert_eq!(manager.current(), Some(generation("v1")));
        assert_eq!(storage.keys().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_initialize_retry_after_failure_succeeds() {
        let (storage, fetcher, manager) = setup();
        fetcher.respond(url("/"), 200, "<html>");
        fetcher.fail(url("/a.css"));

        let v1 = generation("v1");
        let m = manifest(&["/", "/a.css"]);
        assert!(manager.initialize(&v1, &m).await.is_err());

        fetcher.respond(url("/a.css"), 200, "body {}");
        assert_eq!(manager.initialize(&v1, &m).await.unwrap(), 2);
        assert!(storage.is_sealed("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_initialize_current_generation_is_rejected() {
        let (_storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let err = manager
            .initialize(&generation("v1"), &manifest(&["/"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::AlreadyCurrent(_)));
        assert_eq!(err.kind(), crate::cache::ErrorKind::Lifecycle);
    }

    #[tokio::test]
    async fn test_initialize_recorded_current_is_rejected_after_restart() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        // A fresh process that has not resumed yet.
        let restarted = manager_with(storage.clone(), fetcher.clone());
        fetcher.respond(url("/"), 200, "rebuilt");
        let err = restarted
            .initialize(&generation("v1"), &manifest(&["/"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::AlreadyCurrent(_)));
        let key = RequestKey::from_request(&CacheRequest::get(url("/")));
        let kept = storage.lookup("v1", &key).await.unwrap().unwrap();
        assert_eq!(kept.body.as_ref(), b"v1 /");
    }

    async fn assert_store_failure_keeps_v1(make: impl FnOnce(Arc<MemoryStorage>) -> FlakyStorage) {
        let memory = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(Arc::new(make(memory.clone())), fetcher.clone());
        install_and_activate(&manager, &fetcher, "v1", &["/", "/a.css"]).await;

        fetcher.respond(url("/"), 200, "v2 home");
        let v2 = generation("v2");
        let err = manager.initialize(&v2, &manifest(&["/"])).await.unwrap_err();

        assert!(matches!(err, CacheError::ManifestStore { .. }));
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(manager.state(&v2).await.unwrap(), GenerationState::Absent);
        assert_eq!(memory.keys().await.unwrap(), vec!["v1"]);
        assert_eq!(manager.current(), Some(generation("v1")));
        assert_eq!(memory.entries("v1").await.unwrap().len(), 2);

        let home = manager.route(&CacheRequest::get(url("/"))).await.unwrap();
        assert_eq!(home.source, ResponseSource::Cache);
        assert_eq!(home.response.body.as_ref(), b"v1 /");
        assert!(matches!(
            manager.activate_generation(&v2).await,
            Err(CacheError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_initialize_put_failure_discards_generation() {
        assert_store_failure_keeps_v1(|memory| FlakyStorage::new(memory).failing_put(&["v2"])).await;
    }

    #[tokio::test]
    async fn test_initialize_seal_failure_discards_generation() {
        assert_store_failure_keeps_v1(|memory| FlakyStorage::new(memory).failing_seal(&["v2"])).await;
    }

    // ===== Activate =====

    #[tokio::test]
    async fn test_first_activation_deletes_nothing() {
        let (storage, fetcher, manager) = setup();
        fetcher.respond(url("/"), 200, "<html>");
        fetcher.respond(url("/a.css"), 200, "body {}");
        let v1 = generation("v1");
        manager.initialize(&v1, &manifest(&["/", "/a.css"])).await.unwrap();

        let report = manager.activate_generation(&v1).await.unwrap();

        assert_eq!(report.current, v1);
        assert_eq!(report.previous, None);
        assert!(report.deleted.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(manager.current(), Some(v1.clone()));
        assert_eq!(manager.state(&v1).await.unwrap(), GenerationState::Current);
        assert_eq!(storage.keys().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_upgrade_deletes_old_generation() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/", "/old.css"]).await;

        let v2 = generation("v2");
        fetcher.respond(url("/"), 200, "v2 home");
        manager.initialize(&v2, &manifest(&["/"])).await.unwrap();
        let report = manager.activate_generation(&v2).await.unwrap();

        assert_eq!(report.previous, Some(generation("v1")));
        assert_eq!(report.deleted, vec!["v1"]);
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
        assert_eq!(storage.current().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(manager.state(&generation("v1")).await.unwrap(), GenerationState::Absent);

        // /old.css was only ever in v1: now a cache-first miss served by the network.
        fetcher.respond(url("/old.css"), 200, "from network");
        let calls_before = fetcher.calls(&url("/old.css"));
        let routed = manager.route(&CacheRequest::get(url("/old.css"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(routed.response.body.as_ref(), b"from network");
        assert_eq!(fetcher.calls(&url("/old.css")), calls_before + 1);
    }

    #[tokio::test]
    async fn test_deletion_failure_does_not_stop_sweep() {
        let memory = Arc::new(MemoryStorage::new());
        let storage = Arc::new(FlakyStorage::new(memory.clone()).failing_delete(&["old-b"]));
        let fetcher = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(storage.clone(), fetcher.clone());

        for name in ["old-a", "old-b", "old-c"] {
            memory.open(name).await.unwrap();
        }
        fetcher.respond(url("/"), 200, "<html>");
        let v3 = generation("v3");
        manager.initialize(&v3, &manifest(&["/"])).await.unwrap();

        let report = manager.activate_generation(&v3).await.unwrap();

        assert_eq!(manager.current(), Some(v3));
        assert_eq!(report.deleted, vec!["old-a", "old-c"]);
        assert_eq!(report.failed, vec!["old-b"]);
        assert_eq!(memory.keys().await.unwrap(), vec!["old-b", "v3"]);
        assert_eq!(
            manager.state(&generation("old-b")).await.unwrap(),
            GenerationState::Superseded
        );
    }

    #[tokio::test]
    async fn test_swept_name_can_be_installed_again() {
        let (_storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;
        install_and_activate(&manager, &fetcher, "v2", &["/"]).await;
        let v1 = generation("v1");
        assert_eq!(manager.state(&v1).await.unwrap(), GenerationState::Absent);

        manager.initialize(&v1, &manifest(&["/"])).await.unwrap();
        assert_eq!(manager.state(&v1).await.unwrap(), GenerationState::ReadyInactive);
    }

    #[tokio::test]
    async fn test_reactivating_current_reports_no_previous() {
        let (_storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let report = manager.activate_generation(&generation("v1")).await.unwrap();
        assert_eq!(report.current, generation("v1"));
        assert_eq!(report.previous, None);
        assert!(report.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_activation_after_restart_reports_recorded_previous() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let restarted = manager_with(storage.clone(), fetcher.clone());
        let v2 = generation("v2");
        restarted.initialize(&v2, &manifest(&["/"])).await.unwrap();
        let report = restarted.activate_generation(&v2).await.unwrap();

        assert_eq!(report.previous, Some(generation("v1")));
        assert_eq!(report.deleted, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_resume_restores_activated_generation_only() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;
        fetcher.respond(url("/"), 200, "v2 home");
        let v2 = generation("v2");
        manager.initialize(&v2, &manifest(&["/"])).await.unwrap();

        let restarted = manager_with(storage.clone(), fetcher.clone());
        assert_eq!(restarted.current(), None);
        assert_eq!(restarted.resume().await.unwrap(), Some(generation("v1")));
        assert_eq!(restarted.state(&v2).await.unwrap(), GenerationState::ReadyInactive);

        let home = restarted.route(&CacheRequest::get(url("/"))).await.unwrap();
        assert_eq!(home.source, ResponseSource::Cache);
        assert_eq!(home.response.body.as_ref(), b"v1 /");
        // No sweep on resume.
        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn test_resume_without_activation_is_network_only() {
        let (storage, fetcher, manager) = setup();
        assert_eq!(manager.resume().await.unwrap(), None);

        fetcher.respond(url("/"), 200, "<html>");
        manager.initialize(&generation("v1"), &manifest(&["/"])).await.unwrap();

        let restarted = manager_with(storage.clone(), fetcher.clone());
        assert_eq!(restarted.resume().await.unwrap(), None);
        assert_eq!(restarted.current(), None);
    }

    #[tokio::test]
    async fn test_route_during_activation_sees_one_generation() {
        let memory = Arc::new(MemoryStorage::new());
        let scripted = Arc::new(ScriptedFetcher::new());
        let lesson = url("/school/data/lessons/9");
        let fetcher = Arc::new(GatedFetcher::new(scripted.clone(), lesson.clone()));
        let manager = OfflineCacheManager::new(memory.clone(), fetcher.clone(), RoutingTable::default());

        install_and_activate(&manager, &scripted, "v1", &["/"]).await;
        scripted.respond(url("/"), 200, "v2 home");
        let v2 = generation("v2");
        manager.initialize(&v2, &manifest(&["/"])).await.unwrap();
        scripted.respond(lesson.clone(), 200, "lesson 9");

        let request = CacheRequest::get(lesson.clone());
        let (routed, report) = tokio::join!(manager.route(&request), async {
            fetcher.entered().await;
            let report = manager.activate_generation(&v2).await;
            fetcher.release();
            report
        });

        let routed = routed.unwrap();
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(routed.response.body.as_ref(), b"lesson 9");
        assert_eq!(report.unwrap().deleted, vec!["v1"]);

        // The in-flight request wrote to v1, which is gone; v2 holds only its manifest.
        assert_eq!(memory.keys().await.unwrap(), vec!["v2"]);
        let key = RequestKey::from_request(&request);
        assert!(memory.lookup("v2", &key).await.unwrap().is_none());
        let home = manager.route(&CacheRequest::get(url("/"))).await.unwrap();
        assert_eq!(home.response.body.as_ref(), b"v2 home");
    }

    // ===== Route =====

    #[tokio::test]
    async fn test_lesson_data_is_populated_once() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let lesson = url("/school/data/lessons/42");
        fetcher.respond(lesson.clone(), 200, r#"{"units":[]}"#);
        let request = CacheRequest::get(lesson.clone());

        let first = manager.route(&request).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(first.policy, Policy::StaleWhilePopulation);
        assert_eq!(fetcher.calls(&lesson), 1);

        let second = manager.route(&request).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.body, first.response.body);
        assert_eq!(fetcher.calls(&lesson), 1);

        assert_eq!(storage.entries("v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lesson_data_hit_never_touches_network() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let lesson = url("/school/data/lessons/en/math/grade1.json");
        let request = CacheRequest::get(lesson.clone());
        storage
            .put("v1", &RequestKey::from_request(&request), &CachedResponse::new(200, "cached"))
            .await
            .unwrap();
        // Even with the network down.
        fetcher.fail(lesson.clone());

        let routed = manager.route(&request).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Cache);
        assert_eq!(routed.response.body.as_ref(), b"cached");
        assert_eq!(fetcher.calls(&lesson), 0);
    }

    #[tokio::test]
    async fn test_lesson_data_miss_propagates_network_error() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let lesson = url("/school/data/lessons/7");
        fetcher.fail(lesson.clone());

        let err = manager.route(&CacheRequest::get(lesson)).await.unwrap_err();
        assert_eq!(err.kind(), crate::cache::ErrorKind::RouteNetwork);
        assert_eq!(storage.entries("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lesson_data_error_status_is_not_stored() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let lesson = url("/school/data/lessons/missing");
        fetcher.respond(lesson.clone(), 404, "not found");
        let request = CacheRequest::get(lesson.clone());

        assert_eq!(manager.route(&request).await.unwrap().response.status, 404);
        assert_eq!(manager.route(&request).await.unwrap().source, ResponseSource::Network);
        assert_eq!(fetcher.calls(&lesson), 2);
        assert_eq!(storage.entries("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_never_writes() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/", "/a.css"]).await;

        let hit = manager.route(&CacheRequest::get(url("/a.css"))).await.unwrap();
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(hit.policy, Policy::CacheFirst);

        let img = url("/static/img/owl.png");
        fetcher.respond(img.clone(), 200, "png");
        for _ in 0..2 {
            let routed = manager.route(&CacheRequest::get(img.clone())).await.unwrap();
            assert_eq!(routed.source, ResponseSource::Network);
        }
        assert_eq!(fetcher.calls(&img), 2);
        assert_eq!(storage.entries("v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_first_miss_propagates_network_error() {
        let (_storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        fetcher.fail(url("/static/js/extra.js"));
        let err = manager
            .route(&CacheRequest::get(url("/static/js/extra.js")))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::RouteNetwork { .. }));
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let tutor = url("/school/data/lessons/submit");
        fetcher.respond(tutor.clone(), 200, r#"{"ok":true}"#);
        let post = CacheRequest::post_json(tutor.clone(), &serde_json::json!({"a": 1})).unwrap();

        manager.route(&post).await.unwrap();
        manager.route(&post).await.unwrap();

        assert_eq!(fetcher.calls(&tutor), 2);
        assert_eq!(storage.entries("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_without_current_generation_everything_is_network() {
        let (storage, fetcher, manager) = setup();
        storage.open("orphan").await.unwrap();

        let lesson = url("/school/data/lessons/1");
        fetcher.respond(lesson.clone(), 200, "lesson");
        let request = CacheRequest::get(lesson.clone());

        manager.route(&request).await.unwrap();
        let second = manager.route(&request).await.unwrap();

        assert_eq!(second.source, ResponseSource::Network);
        assert_eq!(fetcher.calls(&lesson), 2);
        assert!(storage.entries("orphan").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_routing_table() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(ScriptedFetcher::new());
        let routes = RoutingTable::new().route(
            RoutePattern::PathPrefix("/data/lessons/".to_string()),
            Policy::StaleWhilePopulation,
        );
        let manager = OfflineCacheManager::new(storage.clone(), fetcher.clone(), routes);
        install_and_activate(&manager, &fetcher, "v1", &["/"]).await;

        let lesson = url("/data/lessons/42");
        fetcher.respond(lesson.clone(), 200, "42");
        manager.route(&CacheRequest::get(lesson.clone())).await.unwrap();
        let again = manager.route(&CacheRequest::get(lesson.clone())).await.unwrap();

        assert_eq!(again.source, ResponseSource::Cache);
        assert_eq!(fetcher.calls(&lesson), 1);
    }

    #[tokio::test]
    async fn test_status_lists_stores() {
        let (storage, fetcher, manager) = setup();
        install_and_activate(&manager, &fetcher, "v1", &["/", "/a.css"]).await;
        storage.open("v2").await.unwrap();

        let status = manager.status().await.unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].name, "v1");
        assert!(status[0].current);
        assert!(status[0].sealed);
        assert_eq!(status[0].entries.len(), 2);
        assert_eq!(status[1].name, "v2");
        assert!(!status[1].current);
        assert!(!status[1].sealed);
    }
}
