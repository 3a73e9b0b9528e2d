//! API Module
//!
//! HTTP handlers and routing for the document REST API.
//!
//! # Endpoints
//! - `POST|GET|DELETE /documents` - Create, list and clear documents
//! - `PUT /documents/ensure` - Create unless the name exists
//! - `GET /documents/exists` - Check a name
//! - `GET|PUT|DELETE /documents/:id` - Read, update and delete one document
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
