//! LRU Cache Module
//!
//! Main cache engine combining a HashMap index with a slab-backed recency list
//! and lazy TTL expiration, guarded by a single mutex.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{CacheEntry, CacheStats, RecencyList};
use crate::error::{Result, StoreError};

/// Upper bound on up-front allocation; larger caches grow on demand.
const PREALLOCATE_LIMIT: usize = 1024;

struct Inner<K, V> {
    /// Key -> slot in `order`
    index: HashMap<K, usize>,
    /// Entries by recency, front = most recently used
    order: RecencyList<(K, CacheEntry<V>)>,
    stats: CacheStats,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash,
{
    fn unlink<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.index.remove(key)?;
        let removed = self.order.remove(slot).map(|(_, entry)| entry);
        self.stats.set_total_entries(self.index.len());
        removed
    }
}

// == LRU Cache ==
/// Fixed-capacity map evicting the least recently used entry on overflow.
///
/// `get`, `add` and eviction are O(1). All structural updates happen under one
/// lock whose hold time is bounded by those O(1) updates, so the cache can be
/// shared freely across threads and tasks.
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &inner.index.len())
            .field("stats", &inner.stats)
            .finish()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new cache holding at most `capacity` entries.
    ///
    /// A zero capacity is a configuration error.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StoreError::Configuration(
                "cache capacity must be greater than zero".to_string(),
            ));
        }

        let preallocate = capacity.min(PREALLOCATE_LIMIT);
        Ok(Self {
            inner: Mutex::new(Inner {
                index: HashMap::with_capacity(preallocate),
                order: RecencyList::with_capacity(preallocate),
                stats: CacheStats::new(),
            }),
            capacity,
        })
    }

    // == Add ==
    /// Inserts or overwrites an entry that never expires.
    ///
    /// Returns true if the least recently used entry was evicted to make room.
    pub fn add(&self, key: K, value: V) -> bool {
        self.insert(key, value, None)
    }

    /// Inserts or overwrites an entry that expires after `ttl`.
    ///
    /// Returns true if the least recently used entry was evicted to make room.
    pub fn add_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        self.insert(key, value, Some(ttl))
    }

    fn insert(&self, key: K, value: V, ttl: Option<Duration>) -> bool {
        let entry = CacheEntry::new(value, ttl);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // Overwrite keeps the slot and never evicts
        if let Some(&slot) = inner.index.get(&key) {
            if let Some((_, existing)) = inner.order.get_mut(slot) {
                *existing = entry;
            }
            inner.order.move_to_front(slot);
            return false;
        }

        let mut evicted = false;
        if inner.order.len() >= self.capacity {
            if let Some((oldest, _)) = inner.order.pop_back() {
                inner.index.remove(&oldest);
                inner.stats.record_eviction();
                evicted = true;
            }
        }

        let slot = inner.order.push_front((key.clone(), entry));
        inner.index.insert(key, slot);
        inner.stats.set_total_entries(inner.index.len());
        evicted
    }

    // == Get ==
    /// Retrieves a value and marks it most recently used.
    ///
    /// Misses leave the structure untouched. An expired entry is dropped on
    /// the spot and reported as a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let slot = match inner.index.get(key) {
            Some(&slot) => slot,
            None => {
                inner.stats.record_miss();
                return None;
            }
        };

        let expired = inner
            .order
            .get(slot)
            .map(|(_, entry)| entry.is_expired())
            .unwrap_or(true);
        if expired {
            inner.unlink(key);
            inner.stats.record_expiration();
            inner.stats.record_miss();
            return None;
        }

        inner.order.move_to_front(slot);
        inner.stats.record_hit();
        inner.order.get(slot).map(|(_, entry)| entry.value.clone())
    }

    // == Peek ==
    /// Reads a live value without touching recency or statistics.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.lock();
        let slot = *inner.index.get(key)?;
        inner
            .order
            .get(slot)
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(_, entry)| entry.value.clone())
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.peek(key).is_some()
    }

    // == Delete ==
    /// Removes an entry if present. Absent keys are a no-op.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove(key);
    }

    /// Removes an entry, returning its value if it was present and live.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.inner.lock().unlink(key)?;
        (!entry.is_expired()).then_some(entry.value)
    }

    // == Purge Expired ==
    /// Drops every expired entry and returns how many were removed.
    ///
    /// Expiry is otherwise lazy; nothing calls this on a schedule.
    pub fn purge_expired(&self) -> usize {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired: Vec<K> = inner
            .order
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.unlink(key);
            inner.stats.record_expiration();
        }
        expired.len()
    }

    /// Keys from most to least recently used, expired ones included.
    pub fn keys(&self) -> Vec<K> {
        self.inner
            .lock()
            .order
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.index.len());
        stats
    }

    /// Drops every entry; counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.index.clear();
        inner.order.clear();
        inner.stats.set_total_entries(0);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
