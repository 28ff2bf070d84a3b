//! Application error types and result alias.
//!
//! Every member of the catalog's error taxonomy maps to a distinct HTTP status
//! and a stable machine-readable `code` so API callers can branch on it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Group, variation or lookup reference is missing, or a hidden group was
    /// requested by someone who may not see it
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authenticated but insufficient role
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Missing required field or malformed reference
    #[error("Validation error: {0}")]
    Validation(String),

    /// The image storage collaborator failed or timed out
    #[error("Image storage failed: {0}")]
    StorageFailure(String),

    /// Attempt to delete the only remaining variation of a group
    #[error("Group {0} has a single variation left; delete the group instead")]
    LastVariation(u64),

    /// Update call carrying no fields
    #[error("Nothing to update")]
    NoOp,

    /// Embedded store error
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    /// Row (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Stable error code surfaced to API callers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::StorageFailure(_) => "STORAGE_FAILURE",
            AppError::LastVariation(_) => "LAST_VARIATION",
            AppError::NoOp => "NO_OP",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Json(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::NoOp => StatusCode::BAD_REQUEST,
            AppError::StorageFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::LastVariation(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Json(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// redb reports each stage (open, begin, table, storage, commit) with its own
// error type; fold them all into `AppError::Database` so `?` works everywhere.
macro_rules! from_redb {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(err: $ty) -> Self {
                    AppError::Database(err.into())
                }
            }
        )+
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    redb::SetDurabilityError,
);

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::StorageFailure(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match &self {
            AppError::Database(_) | AppError::Json(_) => "Database operation failed".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request error");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}
