//! API Handlers
//!
//! HTTP request handlers for the document endpoints. Reads go through the
//! repository's cache; writes go to the store and invalidate.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::cache::{LruCache, ShardedCache};
use crate::config::Config;
use crate::error::{ApiError, ApiResult, Result, StoreError};
use crate::models::{
    ClearResponse, CreateDocumentRequest, CreateParams, DeleteParams, DeleteResponse, Document,
    DocumentListResponse, DocumentResponse, ExistsParams, ExistsResponse, HealthResponse,
    ListParams, StatsResponse, UpdateDocumentRequest,
};
use crate::repository::{CacheKey, Cached, DuplicatePolicy, RecordCache, Repository};
use crate::storage::{BackingStore, Filter, MemoryStore, RecordId};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<Repository<Document>>,
}

impl AppState {
    pub fn new(documents: Repository<Document>) -> Self {
        Self {
            documents: Arc::new(documents),
        }
    }

    /// Builds the document repository over an in-memory store.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Builds the document repository over `store`, sized and tuned by `config`.
    pub fn with_store(config: &Config, store: Arc<dyn BackingStore<Document>>) -> Result<Self> {
        config.validate()?;

        let cache: Arc<RecordCache<Document>> = if config.cache_shards > 1 {
            Arc::new(ShardedCache::<CacheKey, Cached<Document>>::new(
                config.cache_capacity,
                config.cache_shards,
            )?)
        } else {
            Arc::new(LruCache::<CacheKey, Cached<Document>>::new(
                config.cache_capacity,
            )?)
        };

        let documents = Repository::builder()
            .cache(cache)
            .store(store)
            .read_ttl(config.read_ttl())
            .query_timeout(config.query_timeout())
            .invalidation(config.invalidation())
            .build()?;

        info!(
            "Document repository ready: capacity={}, shards={}, read_ttl={}s, invalidation={:?}",
            config.cache_capacity,
            config.cache_shards,
            config.read_ttl,
            config.invalidation()
        );
        Ok(Self::new(documents))
    }
}

fn reject(message: Option<String>) -> ApiResult<()> {
    match message {
        Some(msg) => Err(ApiError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Current stored version of a document, bypassing the cache.
async fn load(state: &AppState, id: &RecordId) -> Result<Document> {
    state
        .documents
        .find_matches(Filter::by_id(id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(format!("document with id {}", id)))
}

/// Handler for POST /documents
///
/// Strict by default; `?ignore_duplicate=true` treats an existing name as success.
pub async fn create_document(
    State(state): State<AppState>,
    Query(params): Query<CreateParams>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    reject(req.validate())?;

    let policy = if params.ignore_duplicate {
        DuplicatePolicy::Ignore
    } else {
        DuplicatePolicy::Strict
    };
    let mut doc = req.into_document();
    state.documents.create_with(&mut doc, policy).await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(&doc))))
}

/// Handler for PUT /documents/ensure
///
/// Returns the stored document with the requested name, creating it first
/// if none exists.
pub async fn ensure_document(
    State(state): State<AppState>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<Json<DocumentResponse>> {
    reject(req.validate())?;

    let mut doc = req.into_document();
    state.documents.create_if_not(&mut doc).await?;

    Ok(Json(DocumentResponse::from(&doc)))
}

/// Handler for GET /documents
pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<DocumentListResponse>> {
    reject(params.validate())?;

    let docs = state
        .documents
        .get_items(&params.cache_key(), params.order(), params.limit)
        .await?;

    Ok(Json(DocumentListResponse::new(&docs)))
}

/// Handler for GET /documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentResponse>> {
    let id = RecordId::from(id);
    let doc = state
        .documents
        .read_by_key(&Document::id_key(&id), &id)
        .await?;

    Ok(Json(DocumentResponse::from(doc.as_ref())))
}

/// Handler for GET /documents/exists?name=
pub async fn document_exists(
    State(state): State<AppState>,
    Query(params): Query<ExistsParams>,
) -> ApiResult<Json<ExistsResponse>> {
    let candidate = Document::new(params.name, "");
    let exists = state.documents.exists(&candidate).await?;

    Ok(Json(ExistsResponse {
        name: candidate.name,
        exists,
    }))
}

/// Handler for PUT /documents/:id
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> ApiResult<Json<DocumentResponse>> {
    reject(req.validate())?;

    let mut doc = load(&state, &RecordId::from(id)).await?;
    req.apply(&mut doc);
    state.documents.update(&mut doc).await?;

    Ok(Json(DocumentResponse::from(&doc)))
}

/// Handler for DELETE /documents/:id
///
/// `?soft=true` keeps the row with a deletion stamp.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<Json<DeleteResponse>> {
    let mut doc = load(&state, &RecordId::from(id.as_str())).await?;
    if params.soft {
        state.documents.soft_delete(&mut doc).await?;
    } else {
        state.documents.delete(&doc).await?;
    }

    Ok(Json(DeleteResponse::new(id, params.soft)))
}

/// Handler for DELETE /documents
pub async fn clear_documents(State(state): State<AppState>) -> ApiResult<Json<ClearResponse>> {
    let removed = state.documents.truncate().await?;
    info!("Cleared {} documents", removed);

    Ok(Json(ClearResponse::new(removed)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.documents.cache_stats()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(state.documents.has_store()))
}
