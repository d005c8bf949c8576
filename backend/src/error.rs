//! Error handling for the Agrocast engine
//!
//! Provides one error type for the whole backend and a consistent JSON
//! error body for the HTTP adapter.

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
    // Validation errors (rejected before any I/O)
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    // Forecast pipeline errors
    #[error("Forecast unavailable: all {attempted} providers failed")]
    ForecastUnavailable { attempted: usize },

    #[error("Cache computation failed: {0}")]
    CacheComputation(String),

    // Collaborator errors
    #[error("Observation store error: {0}")]
    ObservationStore(String),

    #[error("Field metadata error: {0}")]
    FieldMetadata(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-scoped validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Errors that are final for the request and must not trigger a retry
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::ValidationError(_)
                | AppError::ForecastUnavailable { .. }
        )
    }

    /// Rebuild an equivalent error from a shared reference.
    ///
    /// Errors coming out of the coalesced cache computation are shared
    /// between waiters; source errors that cannot be cloned are flattened
    /// into their message.
    pub fn from_shared(err: &AppError) -> Self {
        match err {
            AppError::Validation { field, message } => AppError::Validation {
                field: field.clone(),
                message: message.clone(),
            },
            AppError::ValidationError(msg) => AppError::ValidationError(msg.clone()),
            AppError::ForecastUnavailable { attempted } => AppError::ForecastUnavailable {
                attempted: *attempted,
            },
            AppError::CacheComputation(msg) => AppError::CacheComputation(msg.clone()),
            AppError::ObservationStore(msg) => AppError::ObservationStore(msg.clone()),
            AppError::FieldMetadata(msg) => AppError::FieldMetadata(msg.clone()),
            AppError::Configuration(msg) => AppError::Configuration(msg.clone()),
            AppError::DatabaseError(e) => AppError::Internal(format!("database: {}", e)),
            AppError::Internal(msg) => AppError::Internal(msg.clone()),
            AppError::InternalError(e) => AppError::Internal(e.to_string()),
        }
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
        let (status, error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::ForecastUnavailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "FORECAST_UNAVAILABLE".to_string(),
                    message: "No weather provider responded; forecast is temporarily unavailable"
                        .to_string(),
                    field: None,
                },
            ),
            AppError::CacheComputation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CACHE_COMPUTATION_ERROR".to_string(),
                    message: "Forecast computation failed".to_string(),
                    field: None,
                },
            ),
            AppError::ObservationStore(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "OBSERVATION_STORE_ERROR".to_string(),
                    message: format!("Historical observation store error: {}", msg),
                    field: None,
                },
            ),
            AppError::FieldMetadata(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "FIELD_METADATA_ERROR".to_string(),
                    message: format!("Field metadata error: {}", msg),
                    field: None,
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message: format!("Configuration error: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message: "A database error occurred".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred".to_string(),
                    field: None,
                },
            ),
        };

        // Client-caused and degraded-upstream errors are expected in operation
        if self.is_request_fatal() {
            tracing::warn!("Request failed: {}", self);
        } else {
            tracing::error!("Error: {:?}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                AppError::validation(*field, message)
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
