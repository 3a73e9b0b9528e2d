//! Record Module
//!
//! The contract every persisted entity satisfies, plus the embeddable
//! timestamp block most entities carry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::storage::{Filter, Row};

// == Record Id ==
/// String surrogate key of a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh time-ordered identifier (UUIDv7).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// == Record ==
/// A domain entity the repository can create, read, cache and delete.
///
/// `Default` is the zero-valued destination a cache miss is materialized
/// into before the backing store populates it.
pub trait Record: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Collection name, used in log lines and error messages.
    const KIND: &'static str;

    fn id(&self) -> Option<&RecordId>;

    fn set_id(&mut self, id: RecordId) -> Result<()>;

    /// Stamps the soft-delete marker.
    fn set_deleted(&mut self, at: DateTime<Utc>) -> Result<()>;

    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    /// Conditions identifying this record independently of its id.
    fn natural_key(&self) -> Filter;

    /// Called before the record is first persisted.
    fn touch_created(&mut self, _at: DateTime<Utc>) {}

    /// Called before every update.
    fn touch_updated(&mut self, _at: DateTime<Utc>) {}

    /// Returns the id, assigning a generated one first if absent.
    fn ensure_id(&mut self) -> Result<RecordId> {
        if let Some(id) = self.id().filter(|id| !id.is_empty()) {
            return Ok(id.clone());
        }
        let id = RecordId::generate();
        self.set_id(id.clone())?;
        Ok(id)
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }

    // == Row Materialization ==
    /// Builds a record from a stored row.
    fn from_row(row: &Row) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(row.clone()))?)
    }

    /// Flattens the record into a row.
    fn to_row(&self) -> Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            other => Err(StoreError::QueryFailed(format!(
                "{} does not serialize to a row: {}",
                Self::KIND,
                other
            ))),
        }
    }
}

// == Metadata ==
/// Timestamps an entity embeds with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn touch_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    pub fn touch_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
