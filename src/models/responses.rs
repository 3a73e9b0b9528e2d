//! Response DTOs for the document API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::models::Document;

/// A single document as returned by every document endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Document> for DocumentResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            name: doc.name.clone(),
            content: doc.content.clone(),
            created_at: doc.meta.created_at,
            updated_at: doc.meta.updated_at,
        }
    }
}

/// Response body for GET /documents
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListResponse {
    pub count: usize,
    pub documents: Vec<DocumentResponse>,
}

impl DocumentListResponse {
    pub fn new(docs: &[Document]) -> Self {
        let documents: Vec<DocumentResponse> = docs.iter().map(DocumentResponse::from).collect();
        Self {
            count: documents.len(),
            documents,
        }
    }
}

/// Response body for GET /documents/exists
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub name: String,
    pub exists: bool,
}

/// Response body for DELETE /documents/:id
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The id that was deleted
    pub id: String,
    /// Whether the row was kept with a deletion stamp
    pub soft: bool,
}

impl DeleteResponse {
    pub fn new(id: impl Into<String>, soft: bool) -> Self {
        let id = id.into();
        let how = if soft { "soft-deleted" } else { "deleted" };
        Self {
            message: format!("Document '{}' {} successfully", id, how),
            id,
            soft,
        }
    }
}

/// Response body for clearing every document (DELETE /documents)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// Rows removed, soft-deleted ones included
    pub removed: usize,
}

impl ClearResponse {
    pub fn new(removed: usize) -> Self {
        Self {
            message: format!("Removed {} documents", removed),
            removed,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Current number of cached reads
    pub total_entries: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" without a backing store
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(store_attached: bool) -> Self {
        let status = if store_attached { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
