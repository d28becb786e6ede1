//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Validation(String),
    UnsupportedKind(String),
    Extraction(String),
    Retrieval(String),
    Generation(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ApiError::validation(msg)),
            AppError::UnsupportedKind(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ApiError::new("UNSUPPORTED_KIND", msg),
            ),
            AppError::Extraction(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::new("EXTRACTION_ERROR", msg),
            ),
            AppError::Retrieval(msg) => {
                // the caller gets a category, not backend internals
                tracing::error!("retrieval error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("RETRIEVAL_ERROR", "Document retrieval failed"),
                )
            }
            AppError::Generation(msg) => {
                tracing::error!("generation error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError::new("GENERATION_ERROR", "Answer generation failed"),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<docchat_core::ChatError> for AppError {
    fn from(err: docchat_core::ChatError) -> Self {
        use docchat_core::ChatError;

        match err {
            ChatError::Validation(msg) => AppError::Validation(msg),
            ChatError::UnsupportedKind(msg) => AppError::UnsupportedKind(msg),
            ChatError::NotFound(msg) => AppError::NotFound(msg),
            ChatError::Extraction(msg) => AppError::Extraction(msg),
            ChatError::Retrieval(msg) => AppError::Retrieval(msg),
            ChatError::Generation(msg) => AppError::Generation(msg),
            ChatError::Config(msg) => AppError::Internal(format!("configuration error: {msg}")),
            ChatError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}
