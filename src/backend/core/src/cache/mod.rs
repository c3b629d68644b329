//! Read-through cache for goods.
//!
//! The cache is purely an accelerator in front of the store:
//!
//! - reads populate it lazily (cache-aside)
//! - mutations only ever delete entries, never write new values
//! - every cache failure is logged and swallowed, the store stays the source of truth
//!
//! # Usage
//!
//! ```rust,ignore
//! use goods_core::cache::{GoodsCache, InMemoryBackend};
//!
//! let cache = GoodsCache::new(Arc::new(InMemoryBackend::new()), Duration::from_secs(60));
//! if let Some(good) = cache.get(7).await { /* hit */ }
//! cache.invalidate(&[7, 8]).await;
//! ```

pub mod backend;
pub mod key;

pub use backend::{CacheBackend, InMemoryBackend, RedisBackend, RedisConfig};
pub use key::{CacheKey, KeyType};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::goods::Good;
use crate::telemetry::CacheMetrics;

/// Typed, failure-tolerant view of a [`CacheBackend`] holding goods.
#[derive(Clone)]
pub struct GoodsCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl GoodsCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Cached good, if any. Read and decode failures count as misses.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Option<Good> {
        let key = CacheKey::good(id).to_string();

        let bytes = match self.backend.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                CacheMetrics::miss();
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, falling back to store");
                CacheMetrics::miss();
                return None;
            }
        };

        match serde_json::from_slice::<Good>(&bytes) {
            Ok(good) => {
                debug!(key = %key, "Cache hit");
                CacheMetrics::hit();
                Some(good)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                CacheMetrics::miss();
                let _ = self.backend.delete(&key).await;
                None
            }
        }
    }

    /// Store a good read from the store.
    #[instrument(skip(self, good), fields(good_id = good.id))]
    pub async fn set(&self, good: &Good) {
        let key = CacheKey::good(good.id).to_string();
        let bytes = match serde_json::to_vec(good) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode good for cache");
                return;
            }
        };

        if let Err(e) = self.backend.set(&key, &bytes, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Delete the entries of every id. Returns how many deletes succeeded.
    ///
    /// A key that was already absent counts as a success.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn invalidate(&self, ids: &[i64]) -> usize {
        let mut invalidated = 0;
        for &id in ids {
            let key = CacheKey::good(id).to_string();
            match self.backend.delete(&key).await {
                Ok(_) => invalidated += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache invalidation failed; entry may be stale until TTL");
                }
            }
        }
        CacheMetrics::invalidated(invalidated);
        invalidated
    }
}
