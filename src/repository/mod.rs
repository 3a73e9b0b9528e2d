//! Repository Module
//!
//! Cache-aside orchestration in front of a [`BackingStore`]. Reads consult the
//! cache first and only reach the store on a miss; writes go straight to the
//! store and drop the cached reads they make stale.

mod index;
mod shape;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::cache::{Cache, CacheStats};
use crate::error::{Result, StoreError};
use crate::storage::{BackingStore, Filter, ListQuery, Order, Record, RecordId};

pub use index::KeyIndex;
pub use shape::{CacheKey, Cached, Shape};

// == Defaults ==
/// Time-to-live of cached reads unless configured otherwise.
pub const DEFAULT_READ_TTL: Duration = Duration::from_secs(10 * 60);

/// Deadline applied to every backing-store call unless configured otherwise.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum number of index entries before pruning is considered.
const INDEX_PRUNE_FLOOR: usize = 64;

/// Cache shared by all reads of one record kind.
pub type RecordCache<T> = dyn Cache<CacheKey, Cached<T>>;

// == Policies ==
/// What `create` does when the store reports a uniqueness violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Surface it as [`StoreError::Duplicate`]
    #[default]
    Strict,
    /// Treat it as success: the record already exists
    Ignore,
}

/// Whether writes drop the cached reads they affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Invalidation {
    /// Drop every key that cached the written record, and every list key
    #[default]
    ByIdentity,
    /// Leave cached reads alone until they expire or are evicted
    Disabled,
}

// == Builder ==
pub struct RepositoryBuilder<T: Record> {
    cache: Option<Arc<RecordCache<T>>>,
    store: Option<Arc<dyn BackingStore<T>>>,
    read_ttl: Duration,
    query_timeout: Duration,
    invalidation: Invalidation,
}

impl<T: Record> Default for RepositoryBuilder<T> {
    fn default() -> Self {
        Self {
            cache: None,
            store: None,
            read_ttl: DEFAULT_READ_TTL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            invalidation: Invalidation::default(),
        }
    }
}

impl<T: Record> RepositoryBuilder<T> {
    pub fn cache(mut self, cache: Arc<RecordCache<T>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(mut self, store: Arc<dyn BackingStore<T>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn read_ttl(mut self, ttl: Duration) -> Self {
        self.read_ttl = ttl;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn invalidation(mut self, invalidation: Invalidation) -> Self {
        self.invalidation = invalidation;
        self
    }

    /// Builds the repository.
    ///
    /// A cache is mandatory. A missing store is accepted here and reported
    /// by every operation instead.
    pub fn build(self) -> Result<Repository<T>> {
        let cache = self.cache.ok_or_else(|| {
            StoreError::Configuration(format!("{} repository built without a cache", T::KIND))
        })?;
        if self.query_timeout.is_zero() {
            return Err(StoreError::Configuration(
                "query timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Repository {
            cache,
            store: self.store,
            read_ttl: self.read_ttl,
            query_timeout: self.query_timeout,
            invalidation: self.invalidation,
            index: KeyIndex::new(),
        })
    }
}

// == Repository ==
/// Cached access to the records of one kind.
pub struct Repository<T: Record> {
    cache: Arc<RecordCache<T>>,
    store: Option<Arc<dyn BackingStore<T>>>,
    read_ttl: Duration,
    query_timeout: Duration,
    invalidation: Invalidation,
    index: KeyIndex,
}

impl<T: Record> Repository<T> {
    pub fn builder() -> RepositoryBuilder<T> {
        RepositoryBuilder::default()
    }

    /// Repository with default TTL, deadline and invalidation.
    pub fn new(cache: Arc<RecordCache<T>>, store: Arc<dyn BackingStore<T>>) -> Result<Self> {
        Self::builder().cache(cache).store(store).build()
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn read_ttl(&self) -> Duration {
        self.read_ttl
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops one cached read.
    pub fn invalidate(&self, key: &str) {
        self.cache.delete(&key.to_string());
    }

    // == Read Through ==
    /// Returns the value cached under `key`, loading and caching it on a miss.
    ///
    /// On a miss `generator` builds the destination and `loader` populates it.
    /// The loader runs outside any cache lock and under the query deadline.
    /// A failed load is returned as is and nothing is cached. Concurrent misses
    /// on one key may each run the loader; the last one to finish wins. A load
    /// that overlapped a write is returned to its caller but not kept cached.
    pub async fn with_cache<D, G, L, Fut>(
        &self,
        key: &str,
        generator: G,
        ttl: Duration,
        loader: L,
    ) -> Result<Arc<D>>
    where
        D: Shape<T>,
        G: FnOnce() -> D,
        L: FnOnce(D) -> Fut,
        Fut: Future<Output = Result<D>>,
    {
        let key: CacheKey = key.to_string();

        if let Some(cached) = self.cache.get(&key) {
            match D::from_cached(&cached) {
                Some(hit) => {
                    debug!("Cache hit: {}", key);
                    return Ok(hit);
                }
                None => debug!("Cache entry {} has another shape, reloading", key),
            }
        } else {
            debug!("Cache miss: {}", key);
        }

        let epoch = self.index.epoch();
        let loaded = self.deadline("load", loader(generator())).await?;
        let loaded = Arc::new(loaded);
        let cached = D::into_cached(Arc::clone(&loaded));

        if self.cache.add_with_ttl(key.clone(), cached.clone(), ttl) {
            debug!("Caching {} evicted the least recently used entry", key);
        }
        if !self.remember(&key, &cached, epoch) {
            debug!("Dropping {}: a write landed while it was loading", key);
            self.cache.delete(&key);
        }
        Ok(loaded)
    }

    // == Cached Reads ==
    /// Single record by id.
    pub async fn read_by_key(&self, key: &str, id: &RecordId) -> Result<Arc<T>> {
        let store = Arc::clone(self.store()?);
        let id = id.clone();
        self.with_cache(key, T::default, self.read_ttl, |dst| async move {
            store.read_by_key(dst, &id).await
        })
        .await
        .map_err(|err| self.observe("read_by_key", err))
    }

    /// First record matching `filter`.
    pub async fn find_one(&self, key: &str, filter: Filter) -> Result<Arc<T>> {
        let store = Arc::clone(self.store()?);
        self.with_cache(key, T::default, self.read_ttl, |dst| async move {
            store.find_one(dst, &filter).await
        })
        .await
        .map_err(|err| self.observe("find_one", err))
    }

    /// Records matching an arbitrary list query.
    pub async fn find(&self, key: &str, query: ListQuery) -> Result<Arc<Vec<T>>> {
        let store = Arc::clone(self.store()?);
        self.with_cache(key, Vec::new, self.read_ttl, |dst| async move {
            store.find(dst, &query).await
        })
        .await
        .map_err(|err| self.observe("find", err))
    }

    /// Every record, all columns.
    pub async fn read_all(&self, key: &str) -> Result<Arc<Vec<T>>> {
        self.find(key, ListQuery::new()).await
    }

    /// Every record, only the given columns populated.
    pub async fn read_all_with_fields(&self, key: &str, columns: &[&str]) -> Result<Arc<Vec<T>>> {
        self.find(key, ListQuery::new().columns(columns.iter().copied()))
            .await
    }

    /// Every record with optional ordering; a zero or absent limit means no limit.
    pub async fn get_items(
        &self,
        key: &str,
        order: Option<Order>,
        limit: Option<usize>,
    ) -> Result<Arc<Vec<T>>> {
        let query = ListQuery {
            order,
            limit,
            ..ListQuery::default()
        };
        self.find(key, query).await
    }

    // == Uncached Reads ==
    /// Every record matching `filter`, straight from the store.
    pub async fn find_matches(&self, filter: Filter) -> Result<Vec<T>> {
        let store = self.store()?;
        let query = ListQuery::new().filter(filter);
        self.deadline("find_matches", store.find(Vec::new(), &query))
            .await
            .map_err(|err| self.observe("find_matches", err))
    }

    /// One record by id with only `columns` populated, straight from the store.
    pub async fn find_by_key_with_fields(&self, id: &RecordId, columns: &[&str]) -> Result<T> {
        let store = self.store()?;
        let query = ListQuery::new()
            .filter(Filter::by_id(id))
            .columns(columns.iter().copied())
            .limit(1);

        let found = self
            .deadline("find_by_key_with_fields", store.find(Vec::new(), &query))
            .await
            .map_err(|err| self.observe("find_by_key_with_fields", err))?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("{} with id {}", T::KIND, id)))
    }

    // == Writes ==
    /// Persists a new record; a uniqueness violation is an error.
    pub async fn create(&self, record: &mut T) -> Result<()> {
        self.create_with(record, DuplicatePolicy::Strict).await
    }

    /// Persists a new record; a uniqueness violation counts as success.
    pub async fn create_ignore_duplicate(&self, record: &mut T) -> Result<()> {
        self.create_with(record, DuplicatePolicy::Ignore).await
    }

    /// Persists a new record, assigning a generated id if it has none.
    pub async fn create_with(&self, record: &mut T, policy: DuplicatePolicy) -> Result<()> {
        let store = self.store()?;
        let id = record.ensure_id()?;
        record.touch_created(Utc::now());

        let result = self.deadline("create", store.create(record)).await;
        self.check("create", result, policy)?;
        self.invalidate_record(Some(&id));
        Ok(())
    }

    /// Creates the record unless one with the same natural key exists.
    ///
    /// When it exists, `record` is overwritten with the stored version.
    pub async fn create_if_not(&self, record: &mut T) -> Result<()> {
        let store = self.store()?;
        let filter = record.natural_key();

        match self
            .deadline("create_if_not", store.find_one(T::default(), &filter))
            .await
        {
            Ok(existing) => {
                debug!("{} with {} already exists", T::KIND, filter);
                *record = existing;
                Ok(())
            }
            Err(err) if err.is_not_found() => self.create(record).await,
            Err(err) => Err(self.observe("create_if_not", err)),
        }
    }

    /// Whether a record with the same natural key exists.
    pub async fn exists(&self, record: &T) -> Result<bool> {
        let store = self.store()?;
        let filter = record.natural_key();

        match self
            .deadline("exists", store.find_one(T::default(), &filter))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(self.observe("exists", err)),
        }
    }

    pub async fn update(&self, record: &mut T) -> Result<()> {
        let store = self.store()?;
        record.touch_updated(Utc::now());

        let result = self.deadline("update", store.update(record)).await;
        self.check("update", result, DuplicatePolicy::Strict)?;
        self.invalidate_record(record.id());
        Ok(())
    }

    /// Stamps the deletion time and persists the record instead of removing it.
    pub async fn soft_delete(&self, record: &mut T) -> Result<()> {
        let store = self.store()?;
        let now = Utc::now();
        record.set_deleted(now)?;
        record.touch_updated(now);

        let result = self.deadline("soft_delete", store.update(record)).await;
        self.check("soft_delete", result, DuplicatePolicy::Strict)?;
        self.invalidate_record(record.id());
        Ok(())
    }

    pub async fn delete(&self, record: &T) -> Result<()> {
        let store = self.store()?;

        let result = self.deadline("delete", store.delete(record)).await;
        self.check("delete", result, DuplicatePolicy::Strict)?;
        self.invalidate_record(record.id());
        Ok(())
    }

    /// Removes every record of this kind and empties the cache. Returns how
    /// many records were removed.
    pub async fn truncate(&self) -> Result<usize> {
        let store = self.store()?;

        let removed = self
            .deadline("truncate", store.truncate())
            .await
            .map_err(|err| self.observe("truncate", err))?;
        self.index.take_all();
        self.cache.clear();
        warn!("Truncated {} {} records", removed, T::KIND);
        Ok(removed)
    }

    // == Helpers ==
    fn store(&self) -> Result<&Arc<dyn BackingStore<T>>> {
        self.store.as_ref().ok_or_else(|| {
            error!("{} repository has no backing store", T::KIND);
            StoreError::Configuration(format!("{} repository has no backing store", T::KIND))
        })
    }

    /// Runs a store call under the query deadline.
    async fn deadline<R, F>(&self, op: &str, call: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        match tokio::time::timeout(self.query_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::QueryFailed(format!(
                "{} {} exceeded the {:?} deadline",
                T::KIND,
                op,
                self.query_timeout
            ))),
        }
    }

    /// Applies the duplicate policy to a write result.
    fn check(&self, op: &str, result: Result<()>, policy: DuplicatePolicy) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(msg)) if policy == DuplicatePolicy::Ignore => {
                warn!("{} {}: ignoring duplicate ({})", T::KIND, op, msg);
                Ok(())
            }
            Err(err) => Err(self.observe(op, err)),
        }
    }

    /// Logs a classified error on its way to the caller.
    fn observe(&self, op: &str, err: StoreError) -> StoreError {
        match &err {
            StoreError::QueryFailed(msg) => error!("{} {} failed: {}", T::KIND, op, msg),
            StoreError::Configuration(msg) => error!("{} {}: {}", T::KIND, op, msg),
            StoreError::Duplicate(msg) => debug!("{} {}: duplicate ({})", T::KIND, op, msg),
            StoreError::NotFound(msg) => debug!("{} {}: not found ({})", T::KIND, op, msg),
        }
        err
    }

    /// Tracks a freshly cached read. False when it was loaded before a write
    /// that may have changed it.
    fn remember(&self, key: &str, cached: &Cached<T>, epoch: u64) -> bool {
        if self.invalidation == Invalidation::Disabled {
            return true;
        }
        // Single records without an id are tracked like lists.
        if !self.index.remember(epoch, key, cached.record_id()) {
            return false;
        }

        let limit = self.cache.len().saturating_mul(2).max(INDEX_PRUNE_FLOOR);
        let pruned = self
            .index
            .prune_over(limit, |key| self.cache.contains(key));
        if pruned > 0 {
            debug!("Pruned {} stale {} cache keys from the index", pruned, T::KIND);
        }
        true
    }

    fn invalidate_record(&self, id: Option<&RecordId>) {
        if self.invalidation == Invalidation::Disabled {
            return;
        }
        let keys = self.index.take(id);
        if !keys.is_empty() {
            debug!("Invalidating {} cached {} reads", keys.len(), T::KIND);
        }
        for key in &keys {
            self.cache.delete(key);
        }
    }
}
