//! Record fixture shared by unit tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{Filter, Metadata, Record, RecordId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub balance: i64,
    #[serde(flatten)]
    pub meta: Metadata,
}

impl Account {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Record for Account {
    const KIND: &'static str = "account";

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
