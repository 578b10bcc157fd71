//! Error handling for fnlab-http
//!
//! Maps pipeline failures to HTTP responses with an `{"error": ...}` body.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fnlab_core::PipelineError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Malformed request or form
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl PartialEq<StatusCode> for AppError {
    fn eq(&self, status_code: &StatusCode) -> bool {
        let (error_status, _) = self.status_and_message();
        &error_status == status_code
    }
}

impl AppError {
    /// Get the status code and error message for this error
    pub fn status_and_message(&self) -> (StatusCode, String) {
        let status = match self {
            Self::Pipeline(PipelineError::Syntax(_)) => StatusCode::BAD_REQUEST,
            Self::Pipeline(PipelineError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Pipeline(PipelineError::Validation { .. }) => StatusCode::BAD_REQUEST,
            Self::Pipeline(PipelineError::MissingParameter { .. }) => StatusCode::BAD_REQUEST,
            Self::Pipeline(PipelineError::Execution(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        if status.is_server_error() {
            error!(%status, "{}", error_message);
        }

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
