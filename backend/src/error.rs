//! Error handling for the rental inventory backend
//!
//! Every error maps to a stable code and an HTTP status. Store failures are
//! reported as service unavailable so callers can apply their own retry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // ID allocation errors
    #[error("Failed to generate ID for prefix {prefix} after {attempts} attempts")]
    IdGenerationFailed { prefix: String, attempts: u32 },

    #[error("ID generation for prefix {prefix} timed out")]
    IdGenerationTimeout { prefix: String },

    // Store errors
    #[error("Sequence store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code, also reported as `error_type` by health checks
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::IdGenerationFailed { .. } => "ID_GENERATION_FAILED",
            AppError::IdGenerationTimeout { .. } => "ID_GENERATION_TIMEOUT",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::MigrationError(_) => "MIGRATION_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::IdGenerationFailed { .. }
            | AppError::IdGenerationTimeout { .. }
            | AppError::StoreUnavailable(_)
            | AppError::DatabaseError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MigrationError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a caller may reasonably try the same operation again
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::StoreUnavailable(_) | AppError::IdGenerationTimeout { .. } => true,
            AppError::DatabaseError(err) => is_transient_db_error(err),
            _ => false,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(_) | AppError::StoreUnavailable(_) => {
                "The sequence store is temporarily unavailable".to_string()
            }
            AppError::MigrationError(_) | AppError::InternalError(_) => {
                "An internal server error occurred".to_string()
            }
            AppError::NotFound(resource) => format!("{} not found", resource),
            other => other.to_string(),
        }
    }
}

/// Connection loss, pool exhaustion, lock timeouts, serialization failures
/// and deadlocks
fn is_transient_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("40001" | "40P01" | "55P03" | "57014")
        ),
        _ => false,
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_detail = ErrorDetail {
            code: self.code().to_string(),
            message: self.public_message(),
            field: match &self {
                AppError::IdGenerationFailed { .. } | AppError::IdGenerationTimeout { .. } => {
                    Some("prefix".to_string())
                }
                _ => None,
            },
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Error: {:?}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;
