//! Sharded Cache Module
//!
//! Splits the key space over independent LRU shards to reduce lock contention.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::time::Duration;

use crate::cache::{CacheStats, FnvBuildHasher, LruCache};
use crate::error::{Result, StoreError};

// == Sharded Cache ==
/// A set of [`LruCache`] shards addressed by the FNV-1a hash of the key.
///
/// A key always lands on the same shard, so operations on one key stay
/// linearizable. Recency is tracked per shard: on overflow a shard evicts its
/// own least recently used entry, not the globally oldest one.
#[derive(Debug)]
pub struct ShardedCache<K, V> {
    shards: Vec<LruCache<K, V>>,
    hasher: FnvBuildHasher,
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates `shards` shards sharing `capacity` entries, rounded up so
    /// every shard holds at least one.
    pub fn new(capacity: usize, shards: usize) -> Result<Self> {
        if shards == 0 {
            return Err(StoreError::Configuration(
                "cache shard count must be greater than zero".to_string(),
            ));
        }
        if capacity == 0 {
            return Err(StoreError::Configuration(
                "cache capacity must be greater than zero".to_string(),
            ));
        }

        let per_shard = (capacity + shards - 1) / shards;
        let shards = (0..shards)
            .map(|_| LruCache::new(per_shard))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shards,
            hasher: FnvBuildHasher,
        })
    }

    /// Index of the shard owning `key`.
    pub fn shard_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    fn shard<Q>(&self, key: &Q) -> &LruCache<K, V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        &self.shards[self.shard_index(key)]
    }

    pub fn add(&self, key: K, value: V) -> bool {
        self.shard(&key).add(key, value)
    }

    pub fn add_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        self.shard(&key).add_with_ttl(key, value, ttl)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).contains(key)
    }

    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).delete(key)
    }

    pub fn purge_expired(&self) -> usize {
        self.shards.iter().map(LruCache::purge_expired).sum()
    }

    /// Aggregated statistics over all shards.
    pub fn stats(&self) -> CacheStats {
        self.shards.iter().fold(CacheStats::new(), |mut total, shard| {
            total.merge(&shard.stats());
            total
        })
    }

    pub fn clear(&self) {
        self.shards.iter().for_each(LruCache::clear);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(LruCache::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Total capacity after rounding up to whole shards.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(LruCache::capacity).sum()
    }
}
