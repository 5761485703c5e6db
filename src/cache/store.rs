//! Two-tier cache store for one namespace

use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{CacheEntry, CacheKey, DurableError, DurableTier, MemoryTier, Namespace};
use crate::clock::SharedClock;
use crate::config::NamespaceConfig;

/// Namespace-specific rules for what gets stored and what it costs
pub struct CachePolicy<V> {
    /// Values failing this predicate are never stored in either tier
    pub admit: fn(&V) -> bool,
    /// Approximate memory footprint in bytes
    pub cost: fn(&V) -> usize,
}

impl<V> Clone for CachePolicy<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for CachePolicy<V> {}

/// Memory tier in front of a durable tier, sharing one TTL
///
/// Durable-tier failures never reach the caller: reads degrade to a miss and
/// writes are dropped, both with a warning.
///
/// Invalidation and clearing hold `gate` exclusively while they touch both
/// tiers; durable reads, promotions, and writes hold it shared. A read that
/// overlaps an invalidation therefore either completes before it or observes
/// its result, and can never promote a record the invalidation deleted.
pub struct CacheStore<V> {
    namespace: Namespace,
    ttl: Duration,
    memory: Mutex<MemoryTier<V>>,
    durable: DurableTier,
    gate: RwLock<()>,
    policy: CachePolicy<V>,
    clock: SharedClock,
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Creates a store for `namespace` with records under `root`
    pub fn new(
        namespace: Namespace,
        config: &NamespaceConfig,
        root: &Path,
        policy: CachePolicy<V>,
        clock: SharedClock,
    ) -> Self {
        Self {
            namespace,
            ttl: config.ttl,
            memory: Mutex::new(MemoryTier::new(
                config.memory_count_limit,
                config.memory_cost_limit_bytes,
            )),
            durable: DurableTier::new(root, namespace),
            gate: RwLock::new(()),
            policy,
            clock,
        }
    }

    /// Returns the cached value for `key` if it is still fresh
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_entry(key).await.map(|entry| entry.value)
    }

    /// Returns the cached entry for `key`, including its creation time
    ///
    /// Memory is checked first; an expired memory entry is dropped. On a memory
    /// miss the durable tier is read and a fresh hit is promoted back into
    /// memory with its original `created_at`.
    pub async fn get_entry(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let now = self.clock.now();

        {
            let mut memory = self.memory.lock().await;
            let expired = match memory.get(key) {
                Some(entry) if !entry.is_expired(now, self.ttl) => {
                    debug!(key = %key, "memory cache hit");
                    return Some(entry.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                memory.remove(key);
                debug!(key = %key, "expired entry dropped from memory");
            }
        }

        let _shared = self.gate.read().await;

        let entry = match self.durable.read::<V>(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "durable cache read failed, treating as miss");
                if matches!(err, DurableError::Corrupt(_)) {
                    self.remove_durable(key).await;
                }
                return None;
            }
        };

        if entry.is_expired(now, self.ttl) {
            debug!(key = %key, "expired entry dropped from disk");
            self.remove_durable(key).await;
            return None;
        }
        if !(self.policy.admit)(&entry.value) {
            self.remove_durable(key).await;
            return None;
        }

        let cost = (self.policy.cost)(&entry.value);
        let evicted = self.memory.lock().await.insert(key.clone(), entry.clone(), cost);
        debug!(key = %key, evicted = evicted.len(), "promoted disk entry to memory");
        Some(entry)
    }

    /// Stores `value` under `key` in both tiers
    ///
    /// Values rejected by the namespace policy are ignored.
    ///
    /// # Returns
    /// `true` if the value was stored
    pub async fn put(&self, key: &CacheKey, value: V) -> bool {
        if !(self.policy.admit)(&value) {
            debug!(key = %key, "value not admitted to cache");
            return false;
        }

        let _shared = self.gate.read().await;
        let entry = CacheEntry::new(value, self.clock.now());
        let cost = (self.policy.cost)(&entry.value);
        let evicted = self.memory.lock().await.insert(key.clone(), entry.clone(), cost);
        for old in &evicted {
            debug!(key = %old, "evicted from memory");
        }

        if let Err(err) = self.durable.write(key, &entry).await {
            warn!(key = %key, error = %err, "durable cache write failed");
        }
        true
    }

    /// Removes `key` from both tiers
    pub async fn invalidate(&self, key: &CacheKey) {
        let _exclusive = self.gate.write().await;
        self.memory.lock().await.remove(key);
        self.remove_durable(key).await;
    }

    /// Removes every entry whose identity contains `needle` from both tiers
    ///
    /// # Returns
    /// The number of memory and disk entries removed
    pub async fn invalidate_by_query_prefix(&self, needle: &str) -> usize {
        let _exclusive = self.gate.write().await;
        let in_memory = self.memory.lock().await.remove_where(|k| k.matches(needle));
        let on_disk = match self.durable.remove_matching(needle).await {
            Ok(n) => n,
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "durable invalidation failed");
                0
            }
        };
        debug!(namespace = %self.namespace, needle, in_memory, on_disk, "invalidated matching entries");
        in_memory + on_disk
    }

    /// Empties both tiers for this namespace
    pub async fn clear(&self) {
        let _exclusive = self.gate.write().await;
        self.memory.lock().await.clear();
        if let Err(err) = self.durable.clear().await {
            warn!(namespace = %self.namespace, error = %err, "failed to clear durable cache");
        }
        debug!(namespace = %self.namespace, "cache cleared");
    }

    /// Number of entries resident in memory
    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Whether `key` is resident in memory
    pub async fn memory_contains(&self, key: &CacheKey) -> bool {
        self.memory.lock().await.contains(key)
    }

    /// Whether a durable record exists for `key`
    pub async fn durable_contains(&self, key: &CacheKey) -> bool {
        self.durable.contains(key).await
    }

    async fn remove_durable(&self, key: &CacheKey) {
        if let Err(err) = self.durable.remove(key).await {
            warn!(key = %key, error = %err, "failed to remove durable cache record");
        }
    }
}
