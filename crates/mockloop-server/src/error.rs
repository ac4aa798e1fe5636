//! Error types for the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mockloop_exec::ExecError;
use serde_json::json;
use thiserror::Error;

/// Request-level failures. Failures of the executed code never end up here;
/// they are part of a successful response body.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Client error (400), e.g. an unsupported language tag.
    #[error("{0}")]
    BadRequest(String),

    /// No sandbox slot became available in time (503).
    #[error("{0}")]
    Unavailable(String),

    /// The service could not attempt execution at all (500).
    #[error("Failed to execute code: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ExecError> for ApiError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::UnsupportedLanguage { .. } => ApiError::BadRequest(err.to_string()),
            ExecError::Saturated { .. } => ApiError::Unavailable(err.to_string()),
            ExecError::Scratch(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {self}");
        } else {
            log::info!("request rejected: {self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_language_maps_to_400() {
        let err = ApiError::from(ExecError::UnsupportedLanguage {
            language: "go".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Only Python is currently supported");
    }

    #[test]
    fn test_scratch_failure_maps_to_500_with_prefix() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ApiError::from(ExecError::Scratch(io));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Failed to execute code: "), "{err}");
    }

    #[test]
    fn test_saturation_maps_to_503() {
        let err = ApiError::from(ExecError::Saturated { limit: 4 });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
