//! Worker configuration: generation tag, precache manifest, routing knobs.

use url::Url;

use crate::SwError;

/// Configuration compiled into the embedding program.
///
/// The generation tag is the sole mass-invalidation lever: bump it and the
/// next activation evicts every store carrying an older tag under the same
/// prefix.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Namespace prefix for store names owned by this worker. Activation
    /// cleanup never touches stores outside this prefix.
    pub cache_prefix: String,

    /// Cache generation tag. Never mutated at runtime.
    pub generation: String,

    /// Ordered list of URL paths precached unconditionally at install.
    pub precache_manifest: Vec<String>,

    /// Designated index document name. Together with the root path it
    /// selects the network-first policy.
    pub index_document: String,

    /// Origin that manifest paths resolve against and that routed requests
    /// must match.
    pub origin: Url,
}

impl WorkerConfig {
    /// Create a configuration with defaults for the given origin.
    pub fn new(origin: Url) -> Self {
        Self {
            cache_prefix: "offkit".to_string(),
            generation: "v1".to_string(),
            precache_manifest: Vec::new(),
            index_document: "index.html".to_string(),
            origin,
        }
    }

    /// Set the cache prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Set the generation tag.
    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = generation.into();
        self
    }

    /// Set the precache manifest.
    pub fn with_manifest(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.precache_manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SwError> {
        if self.cache_prefix.is_empty() {
            return Err(SwError::Config("cache_prefix must not be empty".to_string()));
        }
        if self.generation.is_empty() {
            return Err(SwError::Config("generation must not be empty".to_string()));
        }
        if self.index_document.is_empty() || self.index_document.contains('/') {
            return Err(SwError::Config(format!(
                "invalid index document name: {:?}",
                self.index_document
            )));
        }
        for path in &self.precache_manifest {
            if !path.starts_with('/') {
                return Err(SwError::Config(format!(
                    "manifest path must be absolute: {:?}",
                    path
                )));
            }
        }
        Ok(())
    }

    /// Name of the active cache store for this generation.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.generation)
    }

    /// Check whether a store name belongs to this worker's namespace.
    pub fn owns_store(&self, name: &str) -> bool {
        name.strip_prefix(&self.cache_prefix)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Resolve a manifest path against the configured origin.
    pub fn resolve(&self, path: &str) -> Result<Url, SwError> {
        self.origin
            .join(path)
            .map_err(|e| SwError::Config(format!("cannot resolve {:?}: {}", path, e)))
    }

    /// Check whether a URL is same-origin with the configured origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.scheme() == self.origin.scheme()
            && url.host() == self.origin.host()
            && url.port_or_known_default() == self.origin.port_or_known_default()
    }

    /// Check whether a URL path selects the network-first policy: the root
    /// path, or any path ending with the designated index document.
    pub fn matches_index(&self, path: &str) -> bool {
        path == "/" || path.ends_with(&format!("/{}", self.index_document))
    }
}
