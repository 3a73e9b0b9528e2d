//! Document record served by the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{Filter, Metadata, Record, RecordId};

/// A named piece of content. Names are unique among live and soft-deleted
/// documents alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub content: String,
    #[serde(flatten)]
    pub meta: Metadata,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Cache key of a read by id.
    pub fn id_key(id: &RecordId) -> String {
        format!("{}:id:{}", Self::KIND, id)
    }
}

impl Record for Document {
    const KIND: &'static str = "document";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) -> Result<()> {
        self.id = Some(id);
        Ok(())
    }

    fn set_deleted(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.meta.mark_deleted(at);
        Ok(())
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.meta.deleted_at
    }

    fn natural_key(&self) -> Filter {
        Filter::new().eq("name", self.name.as_str())
    }

    fn touch_created(&mut self, at: DateTime<Utc>) {
        self.meta.touch_created(at);
    }

    fn touch_updated(&mut self, at: DateTime<Utc>) {
        self.meta.touch_updated(at);
    }
}
