//! Deriving object keys from asset URLs.
//!
//! Clients may point a slot at an asset by URL alone. The resolver tries each
//! registered [`KeyStrategy`] in order and returns the first key found.

use std::sync::Arc;

use madrasa_core::ObjectStorage;
use madrasa_core::object_url::{self, PUBLIC_OBJECT_PATH};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot derive an object key from '{url}'")]
pub struct NotResolvable {
    pub url: String,
}

pub trait KeyStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(&self, url: &str) -> Option<String>;
}

/// Keys of public object URLs: everything after `{prefix}{bucket}/`.
#[derive(Debug, Clone)]
pub struct PublicPrefixStrategy {
    prefix: String,
}

impl PublicPrefixStrategy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for PublicPrefixStrategy {
    fn default() -> Self {
        Self::new(PUBLIC_OBJECT_PATH)
    }
}

impl KeyStrategy for PublicPrefixStrategy {
    fn name(&self) -> &'static str {
        "public_prefix"
    }

    fn resolve(&self, url: &str) -> Option<String> {
        object_url::parse_object_url(url, &self.prefix).map(|location| location.key)
    }
}

/// Delegates to the storage backend's own signed-URL parser.
pub struct StorageUrlStrategy {
    storage: Arc<dyn ObjectStorage>,
}

impl StorageUrlStrategy {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

impl KeyStrategy for StorageUrlStrategy {
    fn name(&self) -> &'static str {
        "storage_signed_url"
    }

    fn resolve(&self, url: &str) -> Option<String> {
        self.storage.parse_signed_url(url)
    }
}

#[derive(Clone, Default)]
pub struct ObjectKeyResolver {
    strategies: Vec<Arc<dyn KeyStrategy>>,
}

impl ObjectKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: impl KeyStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Public-prefix parsing first, then the backend's signed URLs.
    pub fn for_storage(storage: Arc<dyn ObjectStorage>) -> Self {
        Self::new()
            .with_strategy(PublicPrefixStrategy::default())
            .with_strategy(StorageUrlStrategy::new(storage))
    }

    pub fn resolve(&self, url: &str) -> Result<String, NotResolvable> {
        if !url.trim().is_empty() {
            for strategy in &self.strategies {
                if let Some(key) = strategy.resolve(url) {
                    trace!(strategy = strategy.name(), object_key = %key, "Resolved object key");
                    return Ok(key);
                }
            }
        }
        Err(NotResolvable {
            url: url.to_string(),
        })
    }
}

impl std::fmt::Debug for ObjectKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}
