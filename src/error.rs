use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::ingest::types::{ErrorBody, MessageBody};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt document: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures a request handler reports to the caller.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Invalid JSON")]
    InvalidPayload,
    #[error("Too many fields")]
    PayloadTooLarge,
    #[error("No metrics found")]
    NotFound,
    #[error("Database error")]
    Database(#[source] StoreError),
    /// Anything not handled locally; mapped to a generic 500.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload | ApiError::PayloadTooLarge => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::NotFound => {
                (status, Json(MessageBody::new(self.to_string()))).into_response()
            }
            ApiError::Database(e) => {
                tracing::error!(error = %e, "latest query failed");
                (status, Json(ErrorBody::new(self.to_string()))).into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "unhandled fault");
                (status, Json(ErrorBody::new(self.to_string()))).into_response()
            }
            _ => (status, Json(ErrorBody::new(self.to_string()))).into_response(),
        }
    }
}
