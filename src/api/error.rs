//! Unified API error handling
//!
//! Every failure reaches the client as `{error, message, request_id}` where
//! `error` is a stable machine-readable kind.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::service::{AnalysisError, ExtractionError};

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

/// Unified API error type
///
/// All API endpoints return `Result<T, ApiError>` for consistent error handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Malformed or incomplete request body (422)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Analysis pipeline failure, status depends on the kind
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Document-to-text failure (400, or 413 when too large)
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Analysis(e) => e.kind(),
            ApiError::Extraction(e) => e.kind(),
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Analysis(e) => match e {
                AnalysisError::InvalidRequest(_) | AnalysisError::NoAnalyzableContent { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AnalysisError::Timeout { .. } | AnalysisError::DeadlineExceeded(_) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                AnalysisError::Provider { .. } | AnalysisError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
                AnalysisError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Extraction(ExtractionError::TooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Extraction(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = self.kind();
        let request_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                error_type = error_type,
                status = status.as_u16(),
                request_id = %request_id,
                message = %self,
                "API error"
            );
        } else {
            tracing::warn!(
                error_type = error_type,
                status = status.as_u16(),
                request_id = %request_id,
                message = %self,
                "API request rejected"
            );
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id,
        })
    }
}
