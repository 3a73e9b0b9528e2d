//! Cache Module
//!
//! Provides bounded in-memory caching with LRU eviction and lazy TTL expiration.

mod entry;
pub mod fnv;
mod lru;
mod sharded;
mod stats;
mod store;


use std::hash::Hash;
use std::time::Duration;

// Re-export public types
pub use entry::CacheEntry;
pub use fnv::{hash32a, hash64a, FnvBuildHasher, FnvHasher};
pub use lru::RecencyList;
pub use sharded::ShardedCache;
pub use stats::CacheStats;
pub use store::LruCache;

// == Cache Contract ==
/// Operations every cache backend offers to the repository.
///
/// Misses are plain `None`; a cache never fails a lookup.
pub trait Cache<K, V>: Send + Sync {
    /// Inserts or overwrites a non-expiring entry. Returns true on eviction.
    fn add(&self, key: K, value: V) -> bool;

    /// Inserts or overwrites an entry expiring after `ttl`. Returns true on eviction.
    fn add_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool;

    fn get(&self, key: &K) -> Option<V>;

    /// Whether a live entry exists, without touching recency or statistics.
    fn contains(&self, key: &K) -> bool;

    /// Removes the entry if present.
    fn delete(&self, key: &K);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;

    fn clear(&self);
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn add(&self, key: K, value: V) -> bool {
        LruCache::add(self, key, value)
    }

    fn add_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        LruCache::add_with_ttl(self, key, value, ttl)
    }

    fn get(&self, key: &K) -> Option<V> {
        LruCache::get(self, key)
    }

    fn contains(&self, key: &K) -> bool {
        LruCache::contains(self, key)
    }

    fn delete(&self, key: &K) {
        LruCache::delete(self, key)
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }

    fn stats(&self) -> CacheStats {
        LruCache::stats(self)
    }

    fn clear(&self) {
        LruCache::clear(self)
    }
}

impl<K, V> Cache<K, V> for ShardedCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn add(&self, key: K, value: V) -> bool {
        ShardedCache::add(self, key, value)
    }

    fn add_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        ShardedCache::add_with_ttl(self, key, value, ttl)
    }

    fn get(&self, key: &K) -> Option<V> {
        ShardedCache::get(self, key)
    }

    fn contains(&self, key: &K) -> bool {
        ShardedCache::contains(self, key)
    }

    fn delete(&self, key: &K) {
        ShardedCache::delete(self, key)
    }

    fn len(&self) -> usize {
        ShardedCache::len(self)
    }

    fn stats(&self) -> CacheStats {
        ShardedCache::stats(self)
    }

    fn clear(&self) {
        ShardedCache::clear(self)
    }
}
