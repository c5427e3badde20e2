//! # Offkit Service Worker
//!
//! An embeddable offline-cache worker: it primes a named cache store with a
//! fixed asset manifest at install, evicts stale cache generations at
//! activation, and routes every intercepted request through a
//! network-first or cache-first policy based on URL shape.
//!
//! ## Architecture
//!
//! ```text
//! WorkerHost (dispatcher)
//!     │  install ──► ExtendableEvent ──► precache manifest (all-or-nothing)
//!     │  activate ─► ExtendableEvent ──► delete stale stores, then claim
//!     │  fetch ────► FetchEvent ───────► routing decision
//!     │
//!     └── OfflineWorker (EventHandlers)
//!             ├── WorkerConfig   (generation tag, manifest, index name)
//!             ├── CacheStorage   (named stores, request identity → response)
//!             ├── dyn Fetcher    (the network)
//!             └── Clients        (open pages, claiming)
//! ```
//!
//! The cache store is the only shared mutable resource; per-key writes are
//! atomic and concurrent writes to one key resolve last-write-wins.

use offkit_common::OffkitError;
use offkit_net::NetError;
use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod worker;

pub use cache::{CacheKey, CacheStorage, CacheStore, CachedResponse};
pub use clients::{Client, Clients};
pub use config::WorkerConfig;
pub use events::{EventKind, ExtendableEvent, FetchEvent};
pub use lifecycle::{EventHandlers, WorkerHost, WorkerState};
pub use worker::OfflineWorker;

/// Errors that can occur in worker operations.
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No match found for {0}")]
    NoMatch(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Network(#[from] NetError),
}

impl From<SwError> for OffkitError {
    fn from(err: SwError) -> Self {
        match err {
            SwError::Config(m) => OffkitError::config(m),
            SwError::InstallFailed(m) => OffkitError::install(m),
            SwError::InvalidState(m) => OffkitError::lifecycle(m),
            SwError::NoMatch(resource) => OffkitError::NotFound(resource),
            SwError::Cache(m) => OffkitError::cache(m),
            SwError::Network(e) => OffkitError::network_with_source("fetch failed", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_maps_to_unified_categories() {
        let unified: OffkitError = SwError::InstallFailed("asset unreachable".to_string()).into();
        assert_eq!(unified.category(), "install");

        let unified: OffkitError = SwError::NoMatch("GET https://a.com/".to_string()).into();
        assert_eq!(unified.category(), "not_found");

        let unified: OffkitError =
            SwError::Network(NetError::Offline("unreachable".to_string())).into();
        assert_eq!(unified.category(), "network");
        assert!(std::error::Error::source(&unified).is_some());
    }
}
