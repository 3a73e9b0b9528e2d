//! Cached Value Shapes
//!
//! A repository caches both single records and record lists under one key
//! space. [`Cached`] is the value stored in the cache; [`Shape`] converts a
//! typed destination to and from it.

use std::sync::Arc;

use crate::storage::{Record, RecordId};

/// Key identifying one read's shape (query plus parameters).
pub type CacheKey = String;

// == Cached ==
#[derive(Debug)]
pub enum Cached<T> {
    One(Arc<T>),
    Many(Arc<Vec<T>>),
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        match self {
            Cached::One(record) => Cached::One(Arc::clone(record)),
            Cached::Many(records) => Cached::Many(Arc::clone(records)),
        }
    }
}

impl<T: Record> Cached<T> {
    /// Id of a single cached record.
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Cached::One(record) => record.id(),
            Cached::Many(_) => None,
        }
    }
}

// == Shape ==
/// Destination types a read-through can produce: `T` or `Vec<T>`.
pub trait Shape<T>: Sized + Send + Sync + 'static {
    fn into_cached(this: Arc<Self>) -> Cached<T>;

    /// None when the cached value has another shape.
    fn from_cached(cached: &Cached<T>) -> Option<Arc<Self>>;
}

impl<T: Record> Shape<T> for T {
    fn into_cached(this: Arc<Self>) -> Cached<T> {
        Cached::One(this)
    }

    fn from_cached(cached: &Cached<T>) -> Option<Arc<Self>> {
        match cached {
            Cached::One(record) => Some(Arc::clone(record)),
            Cached::Many(_) => None,
        }
    }
}

impl<T: Record> Shape<T> for Vec<T> {
    fn into_cached(this: Arc<Self>) -> Cached<T> {
        Cached::Many(this)
    }

    fn from_cached(cached: &Cached<T>) -> Option<Arc<Self>> {
        match cached {
            Cached::Many(records) => Some(Arc::clone(records)),
            Cached::One(_) => None,
        }
    }
}
