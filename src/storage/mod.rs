//! Storage Module
//!
//! Record contract, query shapes and the backing-store contract the
//! repository consumes, plus an in-memory store implementing it.

mod backing;
mod memory;
mod query;
mod record;

#[cfg(test)]
pub(crate) mod testing;

pub use backing::BackingStore;
pub use memory::{CallCounts, MemoryStore};
pub use query::{Filter, ListQuery, Order, Row};
pub use record::{Metadata, Record, RecordId};
