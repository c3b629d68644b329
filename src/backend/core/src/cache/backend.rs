//! Cache backend implementations.
//!
//! - **InMemoryBackend**: `DashMap` with per-entry expiry
//! - **RedisBackend**: Redis `SET EX` / `GET` / `DEL` over a multiplexed connection
//!
//! Values are opaque bytes; the typed layer above decides the encoding.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::error::{ErrorCode, GoodsError, Result};
use crate::telemetry::redact_url;

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Backend Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Trait for cache backends.
///
/// Absence is `Ok(None)` / `Ok(false)`, never an error.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value from the cache.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Delete a value. Returns whether it was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get the backend name.
    fn name(&self) -> &'static str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Backend
// ═══════════════════════════════════════════════════════════════════════════════

struct InMemoryEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl InMemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local cache backend.
///
/// Expiry uses the tokio clock so paused-time tests can advance past a TTL.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: DashMap<String, InMemoryEntry>,
    reads: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.value().is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `get` calls served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            InMemoryEntry {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired()))
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redis Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for Redis cache.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Key prefix
    pub key_prefix: String,
}

/// Redis cache backend.
pub struct RedisBackend {
    conn: redis::aio::MultiplexedConnection,
    config: RedisConfig,
}

impl RedisBackend {
    /// Connect and verify the server answers PING.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            GoodsError::with_internal(
                ErrorCode::CacheConnectionFailed,
                "Failed to create Redis client",
                e.to_string(),
            )
        })?;

        let mut conn = client.get_multiplexed_async_connection().await.map_err(|e| {
            GoodsError::with_internal(
                ErrorCode::CacheConnectionFailed,
                "Failed to connect to Redis",
                e.to_string(),
            )
        })?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            GoodsError::with_internal(
                ErrorCode::CacheConnectionFailed,
                "Redis ping failed",
                e.to_string(),
            )
        })?;

        info!(url = %redact_url(&config.url), "Redis cache backend connected");

        Ok(Self { conn, config })
    }

    /// Build the full key with prefix.
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let data: Option<Vec<u8>> = conn.get(self.full_key(key)).await?;
        Ok(data)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // SET EX rejects 0
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.full_key(key), value, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(self.full_key(key)).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.full_key(key)).await?;
        Ok(exists)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let backend = InMemoryBackend::new();
        backend.set("good:1", b"{}", Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.get("good:1").await.unwrap(), Some(b"{}".to_vec()));
        assert!(backend.exists("good:1").await.unwrap());
        assert!(backend.delete("good:1").await.unwrap());
        assert!(!backend.delete("good:1").await.unwrap());
        assert_eq!(backend.get("good:1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_expiry() {
        let backend = InMemoryBackend::new();
        backend.set("good:1", b"x", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(backend.get("good:1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(backend.get("good:1").await.unwrap().is_none());
        assert!(backend.is_empty());
    }
}
