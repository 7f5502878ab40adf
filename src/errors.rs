use crate::services::{
    graph_source::GraphError, storage_service::StorageError, sweep_service::SweepError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// HTTP-facing error: a status plus a message rendered as JSON.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BlobNotFound(_) => AppError::not_found(err.to_string()),
            StorageError::InvalidBlobKey => AppError::new(StatusCode::BAD_REQUEST, err.to_string()),
            StorageError::Sqlx(_) | StorageError::Io(_) => {
                tracing::error!(error = %err, "storage failure");
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<GraphError> for AppError {
    fn from(err: GraphError) -> Self {
        tracing::error!(error = %err, "live graph unavailable");
        AppError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
    }
}

impl From<SweepError> for AppError {
    fn from(err: SweepError) -> Self {
        match err {
            SweepError::AlreadyRunning => AppError::new(StatusCode::CONFLICT, err.to_string()),
            SweepError::Enumeration(_) | SweepError::Snapshot(_) => {
                tracing::error!(error = %err, "sweep failed");
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
        }
    }
}
