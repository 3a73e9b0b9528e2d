//! Request DTOs for the document API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::models::Document;
use crate::storage::{Order, RecordId};

/// Longest accepted document name.
pub const MAX_NAME_LEN: usize = 256;

/// Columns a listing can be ordered by.
pub const ORDER_COLUMNS: [&str; 4] = ["name", "created_at", "updated_at", "id"];

fn validate_name(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return Some("Name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Some(format!(
            "Name exceeds maximum length of {} characters",
            MAX_NAME_LEN
        ));
    }
    None
}

/// Request body for POST /documents and PUT /documents/ensure
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

impl CreateDocumentRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if matches!(&self.id, Some(id) if id.trim().is_empty()) {
            return Some("Id cannot be empty".to_string());
        }
        validate_name(&self.name)
    }

    pub fn into_document(self) -> Document {
        let mut doc = Document::new(self.name, self.content);
        doc.id = self.id.map(RecordId::from);
        doc
    }
}

/// Request body for PUT /documents/:id. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl UpdateDocumentRequest {
    pub fn validate(&self) -> Option<String> {
        if self.name.is_none() && self.content.is_none() {
            return Some("Nothing to update".to_string());
        }
        self.name.as_deref().and_then(validate_name)
    }

    pub fn apply(self, doc: &mut Document) {
        if let Some(name) = self.name {
            doc.name = name;
        }
        if let Some(content) = self.content {
            doc.content = content;
        }
    }
}

/// Query string of POST /documents
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CreateParams {
    #[serde(default)]
    pub ignore_duplicate: bool,
}

/// Query string of GET /documents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub desc: bool,
    /// Zero or absent means no limit
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListParams {
    pub fn validate(&self) -> Option<String> {
        match &self.order {
            Some(column) if !ORDER_COLUMNS.contains(&column.as_str()) => Some(format!(
                "Cannot order by '{}', expected one of {}",
                column,
                ORDER_COLUMNS.join(", ")
            )),
            _ => None,
        }
    }

    pub fn order(&self) -> Option<Order> {
        self.order.as_ref().map(|column| Order {
            column: column.clone(),
            descending: self.desc,
        })
    }

    /// Cache key of this listing; equal parameters share one cached read.
    pub fn cache_key(&self) -> String {
        format!(
            "document:list:{}:{}:{}",
            self.order.as_deref().unwrap_or("-"),
            if self.desc { "desc" } else { "asc" },
            self.limit.unwrap_or(0)
        )
    }
}

/// Query string of GET /documents/exists
#[derive(Debug, Clone, Deserialize)]
pub struct ExistsParams {
    pub name: String,
}

/// Query string of DELETE /documents/:id
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub soft: bool,
}
