//! The offline worker: precache on install, evict-then-claim on activate,
//! and per-request policy routing on fetch.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use offkit_net::{Fetcher, Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use crate::cache::{CacheKey, CacheStorage, CachedResponse};
use crate::clients::Clients;
use crate::config::WorkerConfig;
use crate::events::{ExtendableEvent, FetchEvent};
use crate::lifecycle::EventHandlers;
use crate::SwError;

/// A worker serving a small set of static assets offline.
///
/// Routing policy (same-origin GET only; everything else passes straight to
/// the network):
/// - root path or `*/index.html` → network-first, with an opportunistic
///   background cache update on every resolved fetch
/// - anything else → cache-first, with the network as fallback on a miss
pub struct OfflineWorker {
    config: WorkerConfig,
    storage: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<RwLock<Clients>>,
}

impl OfflineWorker {
    /// Create a worker over the given storage, network, and client registry.
    pub fn new(
        config: WorkerConfig,
        storage: CacheStorage,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<RwLock<Clients>>,
    ) -> Result<Self, SwError> {
        config.validate()?;
        Ok(Self {
            config,
            storage,
            fetcher,
            clients,
        })
    }

    /// The worker's configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Fetch and stage every manifest entry, then commit the staged batch.
    /// Any unreachable or non-2xx asset fails the whole install; nothing is
    /// committed in that case.
    async fn precache(
        config: WorkerConfig,
        storage: CacheStorage,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<(), SwError> {
        let store = config.cache_name();
        let mut staged = Vec::with_capacity(config.precache_manifest.len());

        for path in &config.precache_manifest {
            let url = config.resolve(path)?;
            let request = Request::get(url);
            let key = CacheKey::from_request(&request);

            let response = fetcher
                .fetch(request)
                .await
                .map_err(|e| SwError::InstallFailed(format!("{}: {}", path, e)))?;
            if !response.ok() {
                return Err(SwError::InstallFailed(format!(
                    "{}: status {}",
                    path, response.status
                )));
            }

            trace!(path = %path, bytes = response.bytes().len(), "staged manifest asset");
            staged.push((key, CachedResponse::from_response(&response)));
        }

        storage.open(&store).await;
        storage.put_all(&store, staged).await;
        info!(store = %store, assets = config.precache_manifest.len(), "manifest precached");
        Ok(())
    }

    async fn network_first(&self, request: Request, key: CacheKey) -> Result<Response, SwError> {
        let store = self.config.cache_name();
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                // Duplicate before either copy's body is consumed; the write
                // is detached and survives the caller going away.
                let copy = response.clone();
                let storage = self.storage.clone();
                let write_key = key.clone();
                tokio::spawn(async move {
                    storage
                        .put(&store, write_key.clone(), CachedResponse::from_response(&copy))
                        .await;
                    trace!(key = %write_key, "background cache update complete");
                });
                Ok(response)
            }
            Err(err) => {
                debug!(key = %key, error = %err, "network-first fetch failed, trying cache");
                match self.storage.match_request(&store, &key).await {
                    Some(entry) => entry.to_response(),
                    None => Err(SwError::NoMatch(key.to_string())),
                }
            }
        }
    }

    async fn cache_first(&self, request: Request, key: CacheKey) -> Result<Response, SwError> {
        let store = self.config.cache_name();
        match self.storage.match_request(&store, &key).await {
            Some(entry) => {
                trace!(key = %key, "cache hit");
                entry.to_response()
            }
            // A miss goes to the network once; the result is not written
            // back — only install and the network-first path populate the
            // cache.
            None => {
                trace!(key = %key, "cache miss, fetching");
                Ok(self.fetcher.fetch(request).await?)
            }
        }
    }
}

#[async_trait]
impl EventHandlers for OfflineWorker {
    async fn on_install(&self, event: &mut ExtendableEvent) -> Result<(), SwError> {
        event.request_skip_waiting();
        info!(
            store = %self.config.cache_name(),
            assets = self.config.precache_manifest.len(),
            "install: precaching manifest"
        );

        let config = self.config.clone();
        let storage = self.storage.clone();
        let fetcher = self.fetcher.clone();
        event.wait_until(Self::precache(config, storage, fetcher));
        Ok(())
    }

    async fn on_activate(&self, event: &mut ExtendableEvent) -> Result<(), SwError> {
        let config = self.config.clone();
        let storage = self.storage.clone();
        let clients = self.clients.clone();

        event.wait_until(async move {
            let current = config.cache_name();
            let stale: Vec<String> = storage
                .store_names()
                .await
                .into_iter()
                .filter(|name| config.owns_store(name) && *name != current)
                .collect();

            // Deletions are independent; claiming proceeds whatever their
            // individual outcomes.
            let results = join_all(stale.iter().map(|name| storage.delete(name))).await;
            for (name, deleted) in stale.iter().zip(results) {
                if deleted {
                    debug!(store = %name, "deleted stale cache store");
                } else {
                    warn!(store = %name, "stale cache store was already gone");
                }
            }

            let claimed = clients.write().await.claim();
            info!(store = %current, stale = stale.len(), claimed, "activation complete");
            Ok(())
        });
        Ok(())
    }

    async fn on_fetch(&self, event: FetchEvent) -> Result<Response, SwError> {
        let request = event.into_request();

        // Only same-origin GETs are cache-managed.
        if !request.is_get() || !self.config.is_same_origin(&request.url) {
            trace!(url = %request.url, method = %request.method, "pass-through");
            return Ok(self.fetcher.fetch(request).await?);
        }

        let key = CacheKey::from_request(&request);
        if self.config.matches_index(request.url.path()) {
            self.network_first(request, key).await
        } else {
            self.cache_first(request, key).await
        }
    }
}
