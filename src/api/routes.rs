//! API Routes
//!
//! Configures the Axum router with all document endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_documents, create_document, delete_document, document_exists, ensure_document,
    get_document, health_handler, list_documents, stats_handler, update_document, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /documents` - Create a document (`?ignore_duplicate=true` to tolerate an existing name)
/// - `GET /documents` - List documents (`?order=&desc=&limit=`)
/// - `DELETE /documents` - Remove every document
/// - `PUT /documents/ensure` - Create unless the name exists
/// - `GET /documents/exists?name=` - Check a name
/// - `GET /documents/:id` - Read a document
/// - `PUT /documents/:id` - Update a document
/// - `DELETE /documents/:id` - Delete a document (`?soft=true` to keep the row)
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/documents",
            post(create_document)
                .get(list_documents)
                .delete(clear_documents),
        )
        .route("/documents/ensure", put(ensure_document))
        .route("/documents/exists", get(document_exists))
        .route(
            "/documents/:id",
            get(get_document)
                .put(update_document)
                .delete(delete_document),
        )
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
