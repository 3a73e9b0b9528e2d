//! Key Index
//!
//! Reverse index from record identity to the cache keys holding it, so
//! writes can drop the reads they make stale.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::repository::CacheKey;
use crate::storage::RecordId;

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<RecordId, HashSet<CacheKey>>,
    /// List reads, stale after any write
    lists: HashSet<CacheKey>,
    /// Bumped by every `take`; a read loaded under an older epoch may have
    /// raced a write
    epoch: u64,
}

impl Inner {
    fn tracked(&self) -> usize {
        self.lists.len() + self.by_id.values().map(HashSet::len).sum::<usize>()
    }
}

#[derive(Debug, Default)]
pub struct KeyIndex {
    inner: Mutex<Inner>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current invalidation epoch. Capture it before loading a read.
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Tracks `key` as caching record `id`, or as a list read when `id` is
    /// None. Returns false without tracking anything when a write has been
    /// invalidated since `epoch`; the caller's value may predate that write.
    pub fn remember(&self, epoch: u64, key: &str, id: Option<&RecordId>) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        match id {
            Some(id) => {
                inner
                    .by_id
                    .entry(id.clone())
                    .or_default()
                    .insert(key.to_string());
            }
            None => {
                inner.lists.insert(key.to_string());
            }
        }
        true
    }

    /// Removes and returns every key affected by a write to `id`: the keys
    /// caching that record plus every list key.
    pub fn take(&self, id: Option<&RecordId>) -> Vec<CacheKey> {
        let mut inner = self.inner.lock();
        inner.epoch = inner.epoch.wrapping_add(1);
        let mut keys: Vec<CacheKey> = inner.lists.drain().collect();
        if let Some(id) = id {
            if let Some(record_keys) = inner.by_id.remove(id) {
                keys.extend(record_keys);
            }
        }
        keys
    }

    /// Removes and returns every tracked key.
    pub fn take_all(&self) -> Vec<CacheKey> {
        let mut inner = self.inner.lock();
        inner.epoch = inner.epoch.wrapping_add(1);
        let mut keys: Vec<CacheKey> = inner.lists.drain().collect();
        keys.extend(inner.by_id.drain().flat_map(|(_, keys)| keys));
        keys
    }

    /// Drops keys for which `live` returns false once more than `limit`
    /// keys are tracked. Returns the number of keys dropped.
    pub fn prune_over(&self, limit: usize, live: impl Fn(&CacheKey) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.tracked();
        if before <= limit {
            return 0;
        }

        inner.lists.retain(|key| live(key));
        inner.by_id.retain(|_, keys| {
            keys.retain(|key| live(key));
            !keys.is_empty()
        });
        before - inner.tracked()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tracked()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
