//! API error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::CopError;

/// Error type for API handlers; converts to a JSON error response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request data (400).
    #[error("Bad request: {message}")]
    BadRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// The envelope failed validation (422).
    #[error("Validation failed: {message}")]
    Validation {
        /// What failed.
        message: String,
        /// Offending field, when known.
        field: Option<String>,
    },

    /// Internal server error (500).
    #[error("Internal error: {message}")]
    Internal {
        /// What broke.
        message: String,
    },
}

impl ApiError {
    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>, field: Option<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<CopError> for ApiError {
    fn from(err: CopError) -> Self {
        match err {
            CopError::MissingField(field) => Self::Validation {
                message: format!("missing required field: {field}"),
                field: Some(field.to_string()),
            },
            CopError::InvalidPayload(message) => Self::Validation {
                message,
                field: Some("payload".to_string()),
            },
            CopError::Decode(err) => Self::BadRequest {
                message: err.to_string(),
            },
            CopError::Io(err) => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Field that caused the error, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let field = match &self {
            ApiError::Validation { field, .. } => field.clone(),
            _ => None,
        };
        match &self {
            ApiError::Internal { .. } => tracing::error!(error = %self, "API error"),
            _ => tracing::warn!(error = %self, "API error"),
        }
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            field,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let validation = ApiError::from(CopError::MissingField("id"));
        assert_eq!(validation.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(validation.error_code(), "VALIDATION_ERROR");

        let bad = ApiError::bad_request("nope");
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_field_carries_field_name() {
        match ApiError::from(CopError::MissingField("id")) {
            ApiError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("id")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
