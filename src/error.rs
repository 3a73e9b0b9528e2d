//! Error types for the cache-aside layer
//!
//! Every backing-store failure is reported as one of four stable kinds.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

// == Store Error Enum ==
/// Classified error returned by the repository and the backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Uniqueness or constraint violation
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// No matching row
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Any other backing-store failure, deadlines included
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Missing or invalid setup; never worth retrying
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Discriminant of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Duplicate,
    NotFound,
    QueryFailed,
    Configuration,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Duplicate(_) => ErrorKind::Duplicate,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::QueryFailed(_) => ErrorKind::QueryFailed,
            StoreError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind() == ErrorKind::Duplicate
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::QueryFailed(format!("row materialization failed: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::Duplicate(_) => StatusCode::CONFLICT,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::QueryFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

// == API Error ==
/// Error returned by HTTP handlers: a rejected request or a store failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest(_) => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "kind": "invalid_request",
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Store(err) => err.into_response(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result type of HTTP handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
