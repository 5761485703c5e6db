//! Two-tier cache for result pages and assets
//!
//! Each `CacheStore` owns one namespace: a bounded in-memory LRU tier in front
//! of a durable JSON tier on disk. Entries carry only their creation time;
//! expiry is computed from the namespace TTL on every read, so changing the
//! TTL never requires rewriting stored records.

mod durable;
mod key;
mod memory;
mod store;

pub use durable::{DurableError, DurableTier};
pub use key::{CacheKey, Namespace};
pub use memory::MemoryTier;
pub use store::{CachePolicy, CacheStore};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A cached value and the time it was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,
    /// When the value was first stored; promotion between tiers keeps it
    pub created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, created_at: DateTime<Utc>) -> Self {
        Self { value, created_at }
    }

    /// Whether the entry is past `ttl` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.created_at.checked_add_signed(ttl) {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}
