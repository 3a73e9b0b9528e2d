//! lru_aside - cache-aside repositories over a bounded LRU cache
//!
//! Reads are served from an in-process LRU cache with lazy TTL expiry and
//! fall through to a backing store on a miss; writes go to the store and
//! invalidate the cached reads they affect. A small axum service exposes
//! the pattern over HTTP for a single record kind.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod storage;

pub use api::{create_router, AppState};
pub use cache::{Cache, CacheStats, LruCache, ShardedCache};
pub use config::Config;
pub use error::{ApiError, Result, StoreError};
pub use repository::{DuplicatePolicy, Invalidation, Repository, RepositoryBuilder};
pub use storage::{BackingStore, MemoryStore, Record, RecordId};
