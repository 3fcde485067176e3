/// Resolution cache - bounded TTL snapshots of resolve results
///
/// Found and not-found outcomes are cached the same way. An entry is fresh
/// while `now - written_at < ttl`; stale entries are never returned and are
/// superseded on the next write.
use crate::{binding::ResolveResult, clock::Clock};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default key prefix for the Redis store
pub const REDIS_KEY_PREFIX: &str = "trustmesh:resolve:";

/// Cached resolution plus the time it was written (epoch millis)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub result: ResolveResult,
    pub written_at: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: i64, ttl: Duration) -> bool {
        now - self.written_at < ttl.as_millis() as i64
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What a raw stored value turned out to hold
#[derive(Debug, PartialEq)]
pub enum StoredEntry {
    Fresh(CacheEntry),
    Stale,
    Unreadable,
}

/// Serialized form written to shared stores
pub fn encode_entry(entry: &CacheEntry) -> Result<String, CacheError> {
    Ok(serde_json::to_string(entry)?)
}

/// Classify a stored value against the clock
pub fn decode_entry(json: &str, now: i64, ttl: Duration) -> StoredEntry {
    match serde_json::from_str::<CacheEntry>(json) {
        Ok(entry) if entry.is_fresh(now, ttl) => StoredEntry::Fresh(entry),
        Ok(_) => StoredEntry::Stale,
        Err(_) => StoredEntry::Unreadable,
    }
}

/// Redis expiry is whole seconds; rounded up so freshness is decided by `written_at`
pub fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_millis().div_ceil(1000).max(1) as u64
}

/// Storage for resolution snapshots
#[async_trait]
pub trait ResolutionStore: Send + Sync {
    /// Fresh entry for the pair, if any
    async fn get(&self, world_id: &str, address: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Record a resolution for the pair, replacing whatever was there
    async fn put(&self, world_id: &str, address: &str, result: &ResolveResult) -> Result<(), CacheError>;
}

/// Cache key: world id verbatim, address lowercased
pub fn cache_key(world_id: &str, address: &str) -> String {
    format!("{}:{}", world_id, address.to_lowercase())
}

/// Process-local bounded cache
pub struct InMemoryResolutionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryResolutionCache {
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResolutionStore for InMemoryResolutionCache {
    async fn get(&self, world_id: &str, address: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = cache_key(world_id, address);
        let now = self.clock.now_millis();

        let entries = self.entries.read().await;
        Ok(entries
            .get(&key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .cloned())
    }

    async fn put(&self, world_id: &str, address: &str, result: &ResolveResult) -> Result<(), CacheError> {
        let key = cache_key(world_id, address);
        let now = self.clock.now_millis();
        let ttl = self.ttl;

        let mut entries = self.entries.write().await;

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| entry.is_fresh(now, ttl));

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.written_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!("Evicting resolution cache entry {}", oldest);
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                result: result.clone(),
                written_at: now,
            },
        );

        Ok(())
    }
}

/// Redis-backed store shared between service instances
#[derive(Clone)]
pub struct RedisResolutionStore {
    connection: ConnectionManager,
    key_prefix: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RedisResolutionStore {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        info!("✓ Redis connection established");

        Ok(Self {
            connection,
            key_prefix: REDIS_KEY_PREFIX.to_string(),
            ttl,
            clock,
        })
    }

    fn build_key(&self, world_id: &str, address: &str) -> String {
        format!("{}{}", self.key_prefix, cache_key(world_id, address))
    }
}

#[async_trait]
impl ResolutionStore for RedisResolutionStore {
    async fn get(&self, world_id: &str, address: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = self.build_key(world_id, address);
        let mut conn = self.connection.clone();

        let raw: Option<String> = conn.get(&key).await?;
        let Some(json) = raw else {
            return Ok(None);
        };

        match decode_entry(&json, self.clock.now_millis(), self.ttl) {
            StoredEntry::Fresh(entry) => Ok(Some(entry)),
            StoredEntry::Stale => Ok(None),
            StoredEntry::Unreadable => {
                warn!("Discarding unreadable cache entry {}", key);
                let _: Result<(), _> = conn.del(&key).await;
                Ok(None)
            }
        }
    }

    async fn put(&self, world_id: &str, address: &str, result: &ResolveResult) -> Result<(), CacheError> {
        let key = self.build_key(world_id, address);
        let entry = CacheEntry {
            result: result.clone(),
            written_at: self.clock.now_millis(),
        };
        let json = encode_entry(&entry)?;

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&key, json, expiry_secs(self.ttl)).await?;

        Ok(())
    }
}
