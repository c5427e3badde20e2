//! Named cache stores mapping request identity to stored responses.
//!
//! The storage registry is the only shared mutable resource in the engine.
//! It is never locked by callers directly: every operation takes the
//! registry lock internally, so per-key put/delete is atomic and concurrent
//! writes to the same key resolve as last-write-wins.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use offkit_net::{Request, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::trace;
use url::Url;

use crate::SwError;

/// Request identity: method plus normalized URL.
///
/// Normalization drops the fragment; the query is kept because it selects a
/// different resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    method: String,
    url: String,
}

impl CacheKey {
    /// Derive the identity of a request.
    pub fn from_request(request: &Request) -> Self {
        let mut url = request.url.clone();
        url.set_fragment(None);
        Self {
            method: request.method.to_string(),
            url: url.to_string(),
        }
    }

    /// The normalized URL string.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A stored response: status, headers, body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Response URL.
    pub url: String,
    /// Response status.
    pub status: u16,
    /// Response headers, in wire order. Values are raw bytes: header values
    /// are not required to be UTF-8, and a name may repeat.
    pub headers: Vec<(String, Vec<u8>)>,
    /// Response body.
    pub body: Vec<u8>,
    /// Stored-at timestamp (ms since epoch).
    pub stored_at: u64,
}

impl CachedResponse {
    /// Capture a response for storage. The response is borrowed, not
    /// consumed, so the caller keeps its own byte-identical copy.
    pub fn from_response(response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        Self {
            url: response.url.to_string(),
            status: response.status.as_u16(),
            headers,
            body: response.bytes().to_vec(),
            stored_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }

    /// Reconstruct the response this entry was captured from.
    pub fn to_response(&self) -> Result<Response, SwError> {
        let url = Url::parse(&self.url)
            .map_err(|e| SwError::Cache(format!("stored URL unparsable: {}", e)))?;
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| SwError::Cache(format!("stored status invalid: {}", e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| SwError::Cache(format!("stored header name invalid: {}", e)))?;
            let value = HeaderValue::from_bytes(value)
                .map_err(|e| SwError::Cache(format!("stored header value invalid: {}", e)))?;
            // append, not insert: a repeated name keeps every value.
            headers.append(name, value);
        }

        Ok(Response::new(
            url,
            status,
            headers,
            Bytes::from(self.body.clone()),
        ))
    }
}

/// One named store.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: HashMap<CacheKey, CachedResponse>,
}

impl CacheStore {
    /// Look up a request identity.
    pub fn match_request(&self, key: &CacheKey) -> Option<&CachedResponse> {
        self.entries.get(key)
    }

    /// Insert an entry, replacing any previous one for the same key.
    pub fn put(&mut self, key: CacheKey, entry: CachedResponse) {
        self.entries.insert(key, entry);
    }

    /// Remove an entry.
    pub fn delete(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// All stored request identities.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry of named stores. Stores are created on first open and destroyed
/// on explicit delete; the registry holds the only copy of their contents.
#[derive(Debug, Default, Clone)]
pub struct CacheStorage {
    stores: Arc<RwLock<HashMap<String, CacheStore>>>,
}

impl CacheStorage {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store, creating it if it does not exist.
    pub async fn open(&self, name: &str) {
        let mut stores = self.stores.write().await;
        if !stores.contains_key(name) {
            trace!(store = %name, "creating cache store");
            stores.insert(name.to_string(), CacheStore::default());
        }
    }

    /// Check whether a store exists.
    pub async fn has(&self, name: &str) -> bool {
        self.stores.read().await.contains_key(name)
    }

    /// Delete a store by name. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> bool {
        self.stores.write().await.remove(name).is_some()
    }

    /// Names of all existing stores.
    pub async fn store_names(&self) -> Vec<String> {
        self.stores.read().await.keys().cloned().collect()
    }

    /// Look up a request identity in a named store.
    pub async fn match_request(&self, store: &str, key: &CacheKey) -> Option<CachedResponse> {
        self.stores
            .read()
            .await
            .get(store)?
            .match_request(key)
            .cloned()
    }

    /// Write one entry into a named store, creating the store if needed.
    pub async fn put(&self, store: &str, key: CacheKey, entry: CachedResponse) {
        let mut stores = self.stores.write().await;
        stores.entry_ref(store).or_default().put(key, entry);
    }

    /// Commit a batch of entries under a single write lock. Used by install
    /// to land a fully staged manifest in one step.
    pub async fn put_all(&self, store: &str, entries: Vec<(CacheKey, CachedResponse)>) {
        let mut stores = self.stores.write().await;
        let store = stores.entry_ref(store).or_default();
        for (key, entry) in entries {
            store.put(key, entry);
        }
    }

    /// Request identities stored under a name. Empty if the store is absent.
    pub async fn request_keys(&self, store: &str) -> Vec<CacheKey> {
        self.stores
            .read()
            .await
            .get(store)
            .map(CacheStore::keys)
            .unwrap_or_default()
    }

    /// Number of entries in a named store. Zero if the store is absent.
    pub async fn entry_count(&self, store: &str) -> usize {
        self.stores
            .read()
            .await
            .get(store)
            .map(CacheStore::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn entry(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), b"text/plain".to_vec())],
            body: body.to_vec(),
            stored_at: 0,
        }
    }

    #[test]
    fn test_key_drops_fragment() {
        let with_fragment = CacheKey::from_request(&get("https://a.com/page#section"));
        let without = CacheKey::from_request(&get("https://a.com/page"));
        assert_eq!(with_fragment, without);
    }

    #[test]
    fn test_key_keeps_query() {
        let with_query = CacheKey::from_request(&get("https://a.com/page?v=2"));
        let without = CacheKey::from_request(&get("https://a.com/page"));
        assert_ne!(with_query, without);
    }

    #[test]
    fn test_key_distinguishes_method() {
        let mut head = get("https://a.com/page");
        head.method = Method::HEAD;
        assert_ne!(
            CacheKey::from_request(&head),
            CacheKey::from_request(&get("https://a.com/page"))
        );
    }

    #[test]
    fn test_cached_response_round_trip() {
        let stored = entry("https://a.com/style.css", b"body{}");
        let response = stored.to_response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.bytes(), Bytes::from_static(b"body{}"));
        assert_eq!(
            response.headers.get("content-type").unwrap(),
            "text/plain"
        );
    }

    #[test]
    fn test_repeated_header_name_keeps_every_value() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let response = Response::new(
            Url::parse("https://a.com/").unwrap(),
            StatusCode::OK,
            headers,
            Bytes::from_static(b"<html>"),
        );

        let replayed = CachedResponse::from_response(&response)
            .to_response()
            .unwrap();
        let cookies: Vec<&[u8]> = replayed
            .headers
            .get_all("set-cookie")
            .iter()
            .map(|v| v.as_bytes())
            .collect();
        assert_eq!(cookies, vec![b"a=1".as_ref(), b"b=2".as_ref()]);
    }

    #[test]
    fn test_non_utf8_header_value_survives_round_trip() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-binary",
            HeaderValue::from_bytes(b"\xC0\xFE").unwrap(),
        );

        let response = Response::new(
            Url::parse("https://a.com/").unwrap(),
            StatusCode::OK,
            headers,
            Bytes::new(),
        );

        let replayed = CachedResponse::from_response(&response)
            .to_response()
            .unwrap();
        assert_eq!(
            replayed.headers.get("x-binary").unwrap().as_bytes(),
            b"\xC0\xFE"
        );
    }

    #[test]
    fn test_store_put_match_delete() {
        let mut store = CacheStore::default();
        let key = CacheKey::from_request(&get("https://a.com/a.js"));

        assert!(store.match_request(&key).is_none());

        store.put(key.clone(), entry("https://a.com/a.js", b"1"));
        assert!(store.match_request(&key).is_some());
        assert_eq!(store.len(), 1);

        assert!(store.delete(&key));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_last_write_wins() {
        let mut store = CacheStore::default();
        let key = CacheKey::from_request(&get("https://a.com/a.js"));

        store.put(key.clone(), entry("https://a.com/a.js", b"old"));
        store.put(key.clone(), entry("https://a.com/a.js", b"new"));

        assert_eq!(store.match_request(&key).unwrap().body, b"new");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_open_has_delete() {
        let storage = CacheStorage::new();

        assert!(!storage.has("app-v1").await);
        storage.open("app-v1").await;
        assert!(storage.has("app-v1").await);

        assert!(storage.delete("app-v1").await);
        assert!(!storage.has("app-v1").await);
        assert!(!storage.delete("app-v1").await);
    }

    #[tokio::test]
    async fn test_storage_put_creates_store() {
        let storage = CacheStorage::new();
        let key = CacheKey::from_request(&get("https://a.com/a.js"));

        storage
            .put("app-v1", key.clone(), entry("https://a.com/a.js", b"1"))
            .await;

        assert!(storage.has("app-v1").await);
        assert!(storage.match_request("app-v1", &key).await.is_some());
        assert!(storage.match_request("app-v2", &key).await.is_none());
    }

    #[tokio::test]
    async fn test_storage_put_all_commits_batch() {
        let storage = CacheStorage::new();
        let k1 = CacheKey::from_request(&get("https://a.com/a.js"));
        let k2 = CacheKey::from_request(&get("https://a.com/b.js"));

        storage
            .put_all(
                "app-v1",
                vec![
                    (k1.clone(), entry("https://a.com/a.js", b"1")),
                    (k2.clone(), entry("https://a.com/b.js", b"2")),
                ],
            )
            .await;

        assert_eq!(storage.entry_count("app-v1").await, 2);
        assert_eq!(storage.request_keys("app-v1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_storage_names() {
        let storage = CacheStorage::new();
        storage.open("app-v1").await;
        storage.open("other-v9").await;

        let mut names = storage.store_names().await;
        names.sort();
        assert_eq!(names, vec!["app-v1", "other-v9"]);
    }
}
