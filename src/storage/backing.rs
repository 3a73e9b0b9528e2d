//! Backing Store Contract
//!
//! The source of truth the repository sits in front of.

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::{Filter, ListQuery, Record, RecordId};

/// CRUD access to persisted records of one kind.
///
/// Implementations classify their own failures: a uniqueness violation is
/// [`StoreError::Duplicate`](crate::error::StoreError::Duplicate), an empty
/// single-row result is `NotFound`, anything else is `QueryFailed`.
///
/// Single-row reads take a destination and return it populated with the
/// stored columns; bulk reads append to the destination vector.
#[async_trait]
pub trait BackingStore<T: Record>: Send + Sync {
    /// Persists a new record. The record already carries its id.
    async fn create(&self, record: &T) -> Result<()>;

    async fn read_by_key(&self, dst: T, id: &RecordId) -> Result<T>;

    /// First live record matching `filter`.
    async fn find_one(&self, dst: T, filter: &Filter) -> Result<T>;

    /// Every live record matching `query`. An empty result is not an error.
    async fn find(&self, dst: Vec<T>, query: &ListQuery) -> Result<Vec<T>>;

    async fn update(&self, record: &T) -> Result<()>;

    /// Physically removes the record.
    async fn delete(&self, record: &T) -> Result<()>;

    /// Physically removes every record, soft-deleted ones included. Returns
    /// how many were removed.
    async fn truncate(&self) -> Result<usize>;
}
