//! Read-through result cache
//!
//! The cache is best effort. A failing lookup or store is logged and the
//! request continues uncached; cache trouble never fails a request.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use bizlink_common::config::CacheTtls;
use bizlink_common::Result;

pub mod keys;
pub mod memory;
pub mod redis;

pub use keys::{cache_key, invalidation_pattern};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> std::result::Result<(), CacheError>;

    /// Delete every key matching a glob pattern; returns the number removed
    async fn delete_matching(&self, pattern: &str) -> std::result::Result<usize, CacheError>;
}

/// Time-to-live per cached resource
#[derive(Debug, Clone, Copy)]
pub enum Resource {
    Feed,
    Meta,
    Suggestions,
    UserItems,
}

pub fn ttl_for(resource: Resource, ttls: &CacheTtls) -> Duration {
    Duration::from_secs(match resource {
        Resource::Feed => ttls.feed_secs,
        Resource::Meta => ttls.meta_secs,
        Resource::Suggestions => ttls.suggestions_secs,
        Resource::UserItems => ttls.user_items_secs,
    })
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Return the cached value for `key`, or run `producer` and store its result
    ///
    /// Producer errors propagate and are never cached.
    pub async fn with_cache<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => warn!(key = %key, error = %e, "Cache lookup failed, running uncached"),
        }

        let value = producer().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.store.set(key, raw, ttl).await {
                    warn!(key = %key, error = %e, "Cache store failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Result not serializable for cache"),
        }

        Ok(value)
    }

    /// Delete keys matching any `part1*part2*...` group; returns keys removed
    pub async fn delete_keys<S: AsRef<str>>(&self, groups: &[Vec<S>]) -> usize {
        let mut removed = 0;
        for parts in groups {
            let pattern = invalidation_pattern(parts);
            match self.store.delete_matching(&pattern).await {
                Ok(n) => removed += n,
                Err(e) => warn!(pattern = %pattern, error = %e, "Cache invalidation failed"),
            }
        }
        debug!(removed, "Cache invalidation complete");
        removed
    }
}
