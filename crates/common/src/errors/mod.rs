//! Error types for docqa
//!
//! Provides:
//! - One variant per failure class of the retrieval pipeline
//! - HTTP status code mapping for the gateway
//! - Machine-readable error codes
//! - The fail-soft `Outcome` wrapper used by the orchestrator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    DocumentNotFound,

    // Upstream capability errors (8xxx)
    ExtractionError,
    EmbeddingServiceError,
    IndexServiceError,
    CompletionServiceError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::DocumentNotFound => 1002,

            ErrorCode::ExtractionError => 8001,
            ErrorCode::EmbeddingServiceError => 8002,
            ErrorCode::IndexServiceError => 8003,
            ErrorCode::CompletionServiceError => 8004,
            ErrorCode::UpstreamError => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Document not found: {path}")]
    DocumentNotFound { path: String },

    /// The document could not be opened or parsed at all
    #[error("Extraction error for {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingService { message: String },

    #[error("Index service error: {message}")]
    IndexService { message: String },

    #[error("Completion service error: {message}")]
    CompletionService { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::Extraction { .. } => ErrorCode::ExtractionError,
            AppError::EmbeddingService { .. } => ErrorCode::EmbeddingServiceError,
            AppError::IndexService { .. } => ErrorCode::IndexServiceError,
            AppError::CompletionService { .. } => ErrorCode::CompletionServiceError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            AppError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,

            AppError::Extraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::EmbeddingService { .. }
            | AppError::CompletionService { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            AppError::IndexService { .. } => StatusCode::SERVICE_UNAVAILABLE,

            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();
        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::IndexService {
            message: err.to_string(),
        }
    }
}

/// Pipeline stage a failure was observed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Intent,
    Retrieve,
    Synthesize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Intent => "intent",
            Stage::Retrieve => "retrieve",
            Stage::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that was absorbed by a fail-soft stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageFailure {
    pub stage: Stage,
    pub code: ErrorCode,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, err: &AppError) -> Self {
        Self {
            stage,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result of a fail-soft operation.
///
/// `Degraded` still carries a usable value (empty text, empty result list),
/// so callers that only want the value call `into_value`, while callers that
/// need to tell "nothing found" apart from "upstream failed" inspect
/// `failure`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Complete(T),
    Degraded { value: T, failure: StageFailure },
}

impl<T> Outcome<T> {
    /// Absorb an error into the stage's default value
    pub fn from_result(stage: Stage, result: Result<T>) -> Self
    where
        T: Default,
    {
        match result {
            Ok(value) => Outcome::Complete(value),
            Err(err) => {
                tracing::warn!(stage = %stage, error = %err, "Stage degraded to empty value");
                crate::metrics::record_degraded(stage);
                Outcome::Degraded {
                    value: T::default(),
                    failure: StageFailure::new(stage, &err),
                }
            }
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            Outcome::Complete(_) => None,
            Outcome::Degraded { failure, .. } => Some(failure),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::EmbeddingService {
            message: "count mismatch".into(),
        };
        assert_eq!(err.code(), ErrorCode::EmbeddingServiceError);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code().as_code(), 8002);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "question is empty".into(),
            field: Some("question".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_redis_error_is_index_failure() {
        let err: AppError =
            redis::RedisError::from((redis::ErrorKind::ResponseError, "Unknown index name")).into();
        assert_eq!(err.code(), ErrorCode::IndexServiceError);
    }

    #[test]
    fn test_outcome_degrades_to_default() {
        let outcome: Outcome<String> = Outcome::from_result(
            Stage::Intent,
            Err(AppError::CompletionService {
                message: "unavailable".into(),
            }),
        );

        assert!(outcome.is_degraded());
        assert_eq!(outcome.value(), "");
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.stage, Stage::Intent);
        assert_eq!(failure.code, ErrorCode::CompletionServiceError);
    }

    #[test]
    fn test_outcome_complete_keeps_value() {
        let outcome = Outcome::from_result(Stage::Retrieve, Ok(vec![1, 2, 3]));
        assert!(!outcome.is_degraded());
        assert!(outcome.failure().is_none());
        assert_eq!(outcome.into_value(), vec![1, 2, 3]);
    }
}
