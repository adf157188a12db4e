//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; any [`clopetracker_common::Error`]
//! converts with `?`.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clopetracker_common::Error;
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
    status: Option<StatusCode>,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self {
            inner,
            status: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(Error::invalid_input(msg))
    }

    /// Respond with `status` instead of the one derived from the error.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    fn status(&self) -> StatusCode {
        if let Some(status) = self.status {
            return status;
        }
        match &self.inner {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::Storage(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match &self.inner {
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::Conflict(_) => "conflict",
            Error::Database(_) => "database_error",
            Error::Storage(_) => "storage_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::new(Error::internal(format!("blocking task failed: {}", e)))
    }
}

// Keeps the 413 of an exceeded body limit.
impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        Self::new(Error::invalid_input(e.body_text())).with_status(e.status())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}
