//! Error types shared by the stores, the synchronizer and the HTTP layer.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures raised by a catalog backend.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to decode track record: {0}")]
    Decode(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),
}

/// Failures raised by a blob backend.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid blob name: {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to HTTP clients. The display strings are the wire messages.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid upload")]
    InvalidUpload(String),

    #[error("DB error")]
    Database(#[source] CatalogError),

    #[error("Parse error")]
    Parse(#[source] CatalogError),

    #[error("failed to delete from db")]
    DeleteFailed(#[source] CatalogError),
}

impl ApiError {
    /// Classify a failed catalog read: undecodable records are reported apart from query failures.
    pub fn from_listing(err: CatalogError) -> Self {
        match err {
            CatalogError::Decode(_) => ApiError::Parse(err),
            other => ApiError::Database(other),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Parse(_) | ApiError::DeleteFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::InvalidUpload(_) => HttpResponse::build(self.status_code())
                .content_type("text/plain; charset=utf-8")
                .body(self.to_string()),
            _ => HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() })),
        }
    }
}
