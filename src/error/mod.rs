//! Error handling module.
//!
//! This module provides unified error handling with proper HTTP status code mapping
//! and standardized API error responses.

pub mod codes;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub use codes::ErrorCode;

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Roll-number collisions exhausted the retry budget; the caller should resubmit.
    #[error("Roll number conflict in '{0}', please resubmit")]
    Conflict(String),

    /// Record failed validation.
    #[error("{0}")]
    Validation(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Caller supplied credentials that do not match the record.
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Conflict(_) => ErrorCode::ROLL_CONFLICT,
            Self::Validation(_) => ErrorCode::VALIDATION_FAILED,
            Self::BadRequest(_) => ErrorCode::BAD_REQUEST,
            Self::Forbidden(_) => ErrorCode::FORBIDDEN,
            Self::NotFound(_) => ErrorCode::NOT_FOUND,
            Self::Storage(StorageError::DuplicateKey(_)) => ErrorCode::DUPLICATE_KEY,
            Self::Storage(StorageError::Connection(_) | StorageError::Unavailable) => {
                ErrorCode::SERVICE_UNAVAILABLE
            }
            Self::Storage(_) => ErrorCode::STORAGE_ERROR,
            Self::Internal(_) => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Conflict(_) | Self::Storage(StorageError::DuplicateKey(_)) => {
                StatusCode::CONFLICT
            }
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(StorageError::Connection(_) | StorageError::Unavailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is a unique-key collision reported by the store.
    #[must_use]
    pub const fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::Storage(StorageError::DuplicateKey(_)))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().as_i32();
        let message = self.to_string();

        tracing::error!(
            error_code = code,
            status = %status,
            message = %message,
            "Request failed"
        );

        let body = Json(json!({
            "code": code,
            "message": message,
            "data": null
        }));

        (status, body).into_response()
    }
}

/// Storage-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Connection error.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Query failed: {0}")]
    Query(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unique index violation.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire lock: {0}")]
    LockFailed(String),

    /// File I/O error.
    #[error("File I/O error: {0}")]
    FileIO(String),

    /// Data not found.
    #[error("Data not found: {0}")]
    NotFound(String),

    /// Backend not available.
    #[error("Storage backend unavailable")]
    Unavailable,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::FileIO(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias using `StorageError`.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Conflict("competition_roll".to_string()).error_code(),
            ErrorCode::ROLL_CONFLICT
        );
        assert_eq!(
            AppError::Storage(StorageError::DuplicateKey("1001".to_string())).error_code(),
            ErrorCode::DUPLICATE_KEY
        );
        assert_eq!(
            AppError::Storage(StorageError::Unavailable).error_code(),
            ErrorCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Internal("test".to_string()).error_code(),
            ErrorCode::INTERNAL_ERROR
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Conflict("x".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Validation("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Storage(StorageError::Connection("refused".to_string())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Storage(StorageError::Query("syntax".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_is_duplicate_key() {
        assert!(AppError::Storage(StorageError::DuplicateKey("k".to_string())).is_duplicate_key());
        assert!(!AppError::Validation("k".to_string()).is_duplicate_key());
        assert!(!AppError::Storage(StorageError::Unavailable).is_duplicate_key());
    }
}
