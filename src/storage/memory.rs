//! In-Memory Backing Store
//!
//! A process-local implementation of [`BackingStore`] used by the server and
//! the test suites. Rows live in a map keyed by id; ids and natural keys are
//! unique; soft-deleted rows are invisible to reads.

use std::collections::{BTreeMap, VecDeque};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::storage::{BackingStore, Filter, ListQuery, Record, RecordId, Row};

// == Call Counters ==
#[derive(Debug, Default)]
struct Counters {
    create: AtomicUsize,
    read_by_key: AtomicUsize,
    find_one: AtomicUsize,
    find: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    truncate: AtomicUsize,
}

/// Snapshot of how often each store operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
    pub create: usize,
    pub read_by_key: usize,
    pub find_one: usize,
    pub find: usize,
    pub update: usize,
    pub delete: usize,
    pub truncate: usize,
}

impl CallCounts {
    /// Total read operations.
    pub fn reads(&self) -> usize {
        self.read_by_key + self.find_one + self.find
    }

    pub fn writes(&self) -> usize {
        self.create + self.update + self.delete + self.truncate
    }
}

// == Memory Store ==
pub struct MemoryStore<T> {
    rows: RwLock<BTreeMap<RecordId, Row>>,
    counters: Counters,
    /// Errors returned, in order, by the next calls
    faults: Mutex<VecDeque<StoreError>>,
    latency: Option<Duration>,
    _record: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.rows.read().len())
            .field("latency", &self.latency)
            .finish()
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            counters: Counters::default(),
            faults: Mutex::new(VecDeque::new()),
            latency: None,
            _record: PhantomData,
        }
    }

    /// Delays every call by `latency` before touching the rows.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next call fail with `err`, whatever the operation.
    pub fn fail_next(&self, err: StoreError) {
        self.faults.lock().push_back(err);
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            create: c.create.load(Ordering::Relaxed),
            read_by_key: c.read_by_key.load(Ordering::Relaxed),
            find_one: c.find_one.load(Ordering::Relaxed),
            find: c.find.load(Ordering::Relaxed),
            update: c.update.load(Ordering::Relaxed),
            delete: c.delete.load(Ordering::Relaxed),
            truncate: c.truncate.load(Ordering::Relaxed),
        }
    }

    /// Number of stored rows, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored row, soft-deleted or not.
    pub fn row(&self, id: &RecordId) -> Option<Row> {
        self.rows.read().get(id).cloned()
    }

    /// Every stored record, soft-deleted ones included.
    pub fn records(&self) -> Result<Vec<T>> {
        self.rows.read().values().map(T::from_row).collect()
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.faults.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_live(row: &Row) -> Result<bool> {
        Ok(!T::from_row(row)?.is_deleted())
    }

    /// Overlays stored columns onto the destination's own row.
    fn populate(dst: &T, row: &Row) -> Result<T> {
        let mut merged = dst.to_row()?;
        merged.extend(row.clone());
        T::from_row(&merged)
    }

    fn require_id(record: &T) -> Result<RecordId> {
        record
            .id()
            .filter(|id| !id.is_empty())
            .cloned()
            .ok_or_else(|| StoreError::QueryFailed(format!("{} record has no id", T::KIND)))
    }

    /// Duplicate if another row shares the record's natural key.
    fn check_natural_key(rows: &BTreeMap<RecordId, Row>, id: &RecordId, record: &T) -> Result<()> {
        let key = record.natural_key();
        if key.is_empty() {
            return Ok(());
        }
        let clash = rows
            .iter()
            .any(|(other, row)| other != id && key.matches(row));
        if clash {
            return Err(StoreError::Duplicate(format!(
                "{} with {} already exists",
                T::KIND,
                key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Record> BackingStore<T> for MemoryStore<T> {
    async fn create(&self, record: &T) -> Result<()> {
        self.enter(&self.counters.create).await?;
        let id = Self::require_id(record)?;
        let row = record.to_row()?;

        let mut rows = self.rows.write();
        if rows.contains_key(&id) {
            return Err(StoreError::Duplicate(format!(
                "{} with id {} already exists",
                T::KIND,
                id
            )));
        }
        Self::check_natural_key(&rows, &id, record)?;
        rows.insert(id, row);
        Ok(())
    }

    async fn read_by_key(&self, dst: T, id: &RecordId) -> Result<T> {
        self.enter(&self.counters.read_by_key).await?;
        let rows = self.rows.read();
        match rows.get(id) {
            Some(row) if Self::is_live(row)? => Self::populate(&dst, row),
            _ => Err(StoreError::NotFound(format!("{} with id {}", T::KIND, id))),
        }
    }

    async fn find_one(&self, dst: T, filter: &Filter) -> Result<T> {
        self.enter(&self.counters.find_one).await?;
        let rows = self.rows.read();
        for row in rows.values().filter(|row| filter.matches(row)) {
            if Self::is_live(row)? {
                return Self::populate(&dst, row);
            }
        }
        Err(StoreError::NotFound(format!("{} with {}", T::KIND, filter)))
    }

    async fn find(&self, mut dst: Vec<T>, query: &ListQuery) -> Result<Vec<T>> {
        self.enter(&self.counters.find).await?;
        let mut matched: Vec<Row> = {
            let rows = self.rows.read();
            let mut matched = Vec::new();
            for row in rows.values().filter(|row| query.filter.matches(row)) {
                if Self::is_live(row)? {
                    matched.push(row.clone());
                }
            }
            matched
        };

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| order.compare(a, b));
        }
        if let Some(limit) = query.effective_limit() {
            matched.truncate(limit);
        }

        let template = T::default();
        for row in &matched {
            dst.push(Self::populate(&template, &query.project(row))?);
        }
        Ok(dst)
    }

    async fn update(&self, record: &T) -> Result<()> {
        self.enter(&self.counters.update).await?;
        let id = Self::require_id(record)?;
        let row = record.to_row()?;

        let mut rows = self.rows.write();
        if !rows.contains_key(&id) {
            return Err(StoreError::NotFound(format!("{} with id {}", T::KIND, id)));
        }
        Self::check_natural_key(&rows, &id, record)?;
        rows.insert(id, row);
        Ok(())
    }

    async fn delete(&self, record: &T) -> Result<()> {
        self.enter(&self.counters.delete).await?;
        let id = Self::require_id(record)?;
        match self.rows.write().remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("{} with id {}", T::KIND, id))),
        }
    }

    async fn truncate(&self) -> Result<usize> {
        self.enter(&self.counters.truncate).await?;
        let mut rows = self.rows.write();
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }
}
