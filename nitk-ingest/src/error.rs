//! Error types for nitk-ingest
//!
//! `IngestError` is the pipeline taxonomy. Every per-file variant is caught
//! at the orchestrator boundary. `ApiError` is the HTTP-facing wrapper.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline error taxonomy
#[derive(Debug, Error)]
pub enum IngestError {
    /// Watched directory missing or otherwise unusable; fatal for the session
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Container parse, channel extraction or waveform decode failure
    #[error("Decode error: {0}")]
    Decode(String),

    /// Metrics engine failure on a decoded waveform
    #[error("Compute error: {0}")]
    Compute(String),

    /// Transaction failure; the transaction was rolled back
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// A live subscriber could not be reached
    #[error("Broadcast error: {0}")]
    Broadcast(String),

    /// Filesystem failure outside decoding (artifact cleanup, listing)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crate::tdms::TdmsError> for IngestError {
    fn from(err: crate::tdms::TdmsError) -> Self {
        IngestError::Decode(err.to_string())
    }
}

impl From<hound::Error> for IngestError {
    fn from(err: hound::Error) -> Self {
        IngestError::Decode(format!("WAV write failed: {}", err))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Pipeline error surfaced through an endpoint
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Ingest(IngestError::Configuration(msg)) => {
                (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR", msg)
            }
            ApiError::Ingest(ref err @ IngestError::Persistence(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                err.to_string(),
            ),
            ApiError::Ingest(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INGEST_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
