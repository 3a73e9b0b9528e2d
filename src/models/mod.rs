//! Records and DTOs for the document API
//!
//! [`Document`] is the record kind the service caches; the request and
//! response types shape the HTTP bodies around it.

pub mod document;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use document::Document;
pub use requests::{
    CreateDocumentRequest, CreateParams, DeleteParams, ExistsParams, ListParams,
    UpdateDocumentRequest,
};
pub use responses::{
    ClearResponse, DeleteResponse, DocumentListResponse, DocumentResponse, ExistsResponse, HealthResponse,
    StatsResponse,
};
