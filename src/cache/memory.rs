//! Bounded in-memory tier with least-recently-used eviction
//!
//! Bounded by entry count and by aggregate cost. Recency is a monotonically
//! increasing tick; a `BTreeMap` from tick to key yields the eviction order
//! without scanning, and the slot map supports enumeration directly.


use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use super::{CacheEntry, CacheKey};

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    cost: usize,
    last_used: u64,
}

/// LRU map bounded by count and cost
#[derive(Debug)]
pub struct MemoryTier<V> {
    slots: HashMap<CacheKey, Slot<V>>,
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
    total_cost: usize,
    count_limit: usize,
    cost_limit: usize,
}

impl<V> MemoryTier<V> {
    /// Creates an empty tier
    ///
    /// # Arguments
    /// * `count_limit` - Maximum number of entries
    /// * `cost_limit` - Maximum aggregate cost in bytes
    pub fn new(count_limit: usize, cost_limit: usize) -> Self {
        Self {
            slots: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
            total_cost: 0,
            count_limit,
            cost_limit,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Looks up an entry and marks it most recently used
    pub fn get(&mut self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        let tick = self.next_tick();
        let slot = self.slots.get_mut(key)?;
        self.recency.remove(&slot.last_used);
        slot.last_used = tick;
        self.recency.insert(tick, key.clone());
        Some(&slot.entry)
    }

    /// Whether `key` is resident, without touching recency
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Inserts an entry, evicting least-recently-used entries to make room
    ///
    /// An entry whose cost alone exceeds the cost limit is not kept in memory.
    ///
    /// # Returns
    /// The keys that were evicted to make room
    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry<V>, cost: usize) -> Vec<CacheKey> {
        self.remove(&key);

        if cost > self.cost_limit {
            trace!(key = %key, cost, "entry larger than memory tier, not kept");
            return Vec::new();
        }

        let mut evicted = Vec::new();
        while !self.slots.is_empty()
            && (self.slots.len() >= self.count_limit
                || self.total_cost.saturating_add(cost) > self.cost_limit)
        {
            match self.evict_lru() {
                Some(old) => evicted.push(old),
                None => break,
            }
        }

        let tick = self.next_tick();
        self.recency.insert(tick, key.clone());
        self.total_cost = self.total_cost.saturating_add(cost);
        self.slots.insert(
            key,
            Slot {
                entry,
                cost,
                last_used: tick,
            },
        );
        evicted
    }

    fn evict_lru(&mut self) -> Option<CacheKey> {
        let (_, key) = self.recency.pop_first()?;
        if let Some(slot) = self.slots.remove(&key) {
            self.total_cost = self.total_cost.saturating_sub(slot.cost);
        }
        Some(key)
    }

    /// Removes an entry
    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.last_used);
        self.total_cost = self.total_cost.saturating_sub(slot.cost);
        Some(slot.entry)
    }

    /// Removes every entry whose key satisfies `predicate`
    ///
    /// # Returns
    /// The number of entries removed
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&CacheKey) -> bool) -> usize {
        let doomed: Vec<CacheKey> = self.slots.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.recency.clear();
        self.total_cost = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(value: &str) -> CacheEntry<String> {
        CacheEntry::new(value.to_string(), Utc::now())
    }

    #[test]
    fn test_count_limit_evicts_least_recently_used() {
        let mut tier = MemoryTier::new(2, 1_000);
        tier.insert(CacheKey::page("a", 1), entry("a"), 10);
        tier.insert(CacheKey::page("b", 1), entry("b"), 10);

        // Touch "a" so "b" becomes the oldest
        assert!(tier.get(&CacheKey::page("a", 1)).is_some());

        let evicted = tier.insert(CacheKey::page("c", 1), entry("c"), 10);

        assert_eq!(evicted, vec![CacheKey::page("b", 1)]);
        assert_eq!(tier.len(), 2);
        assert!(tier.contains(&CacheKey::page("a", 1)));
        assert!(tier.contains(&CacheKey::page("c", 1)));
    }

    #[test]
    fn test_cost_limit_evicts_until_it_fits() {
        let mut tier = MemoryTier::new(10, 100);
        tier.insert(CacheKey::page("a", 1), entry("a"), 40);
        tier.insert(CacheKey::page("b", 1), entry("b"), 40);

        let evicted = tier.insert(CacheKey::page("c", 1), entry("c"), 50);

        assert_eq!(evicted, vec![CacheKey::page("a", 1)]);
        assert_eq!(tier.total_cost(), 90);
    }

    #[test]
    fn test_oversized_entry_is_not_kept() {
        let mut tier = MemoryTier::new(10, 100);
        tier.insert(CacheKey::page("a", 1), entry("a"), 40);

        let evicted = tier.insert(CacheKey::page("huge", 1), entry("huge"), 101);

        assert!(evicted.is_empty());
        assert!(!tier.contains(&CacheKey::page("huge", 1)));
        assert!(tier.contains(&CacheKey::page("a", 1)));
    }

    #[test]
    fn test_reinsert_replaces_cost() {
        let mut tier = MemoryTier::new(10, 100);
        tier.insert(CacheKey::page("a", 1), entry("a"), 40);
        tier.insert(CacheKey::page("a", 1), entry("a2"), 10);

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.total_cost(), 10);
        assert_eq!(tier.get(&CacheKey::page("a", 1)).unwrap().value, "a2");
    }

    #[test]
    fn test_remove_where_matches_keys() {
        let mut tier = MemoryTier::new(10, 1_000);
        tier.insert(CacheKey::page("Apple", 1), entry("1"), 1);
        tier.insert(CacheKey::page("Apple", 2), entry("2"), 1);
        tier.insert(CacheKey::page("Banana", 1), entry("3"), 1);

        let removed = tier.remove_where(|k| k.matches("Apple"));

        assert_eq!(removed, 2);
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.total_cost(), 1);
    }

    #[test]
    fn test_clear_empties_tier() {
        let mut tier = MemoryTier::new(10, 1_000);
        tier.insert(CacheKey::page("Apple", 1), entry("1"), 5);
        assert!(!tier.is_empty());

        tier.clear();

        assert!(tier.is_empty());
        assert_eq!(tier.total_cost(), 0);
        assert!(tier.get(&CacheKey::page("Apple", 1)).is_none());
    }

    #[test]
    fn test_never_exceeds_count_limit() {
        let mut tier = MemoryTier::new(3, usize::MAX);
        for i in 0..10 {
            tier.insert(CacheKey::page("q", i), entry("v"), 1);
            assert!(tier.len() <= 3);
        }
    }
}
