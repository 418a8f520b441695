//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how each
//! error is reported to HTTP clients.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use procurement_core::ports::PortError;
use procurement_core::workflow::{FieldError, WorkflowError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A workflow operation failed.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// The request could not be read (malformed multipart body, bad field).
    #[error("{0}")]
    BadRequest(String),

    /// Sign-in failed; the message is shown to the client.
    #[error("{0}")]
    Unauthorized(String),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldErrorBody>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldErrorBody {
    pub field: String,
    pub message: String,
}

impl From<FieldError> for FieldErrorBody {
    fn from(e: FieldError) -> Self {
        Self {
            field: e.field,
            message: e.message,
        }
    }
}

const INTERNAL_MESSAGE: &str = "Something went wrong. Please try again later.";

impl ApiError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let body = |message: String, errors: Option<Vec<FieldErrorBody>>| ErrorBody {
            success: false,
            message,
            errors,
        };

        match self {
            ApiError::Workflow(WorkflowError::Validation(errors)) => (
                StatusCode::BAD_REQUEST,
                body(
                    "Invalid request".to_string(),
                    Some(errors.into_iter().map(Into::into).collect()),
                ),
            ),
            ApiError::Workflow(e @ WorkflowError::MissingDocument(_)) => {
                (StatusCode::BAD_REQUEST, body(e.to_string(), None))
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, body(message, None)),
            ApiError::Workflow(e @ WorkflowError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, body(e.to_string(), None))
            }
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, body(message, None)),
            ApiError::Workflow(
                e @ (WorkflowError::NotFound(_)
                | WorkflowError::UnknownEmail
                | WorkflowError::ExpiredOrInvalidCode),
            ) => (StatusCode::NOT_FOUND, body(e.to_string(), None)),
            ApiError::Workflow(
                e @ (WorkflowError::DuplicateAccount | WorkflowError::AlreadyApplied { .. }),
            ) => (StatusCode::CONFLICT, body(e.to_string(), None)),
            ApiError::Workflow(e @ WorkflowError::AccountCreationFailed(_)) => {
                error!(error = ?e, "Account creation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, body(e.to_string(), None))
            }
            other => {
                error!(error = ?other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    body(INTERNAL_MESSAGE.to_string(), None),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: impl Into<ApiError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(WorkflowError::Validation(vec![FieldError::new("page", "bad")])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(WorkflowError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(ApiError::Unauthorized("No account found".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(WorkflowError::UnknownEmail), StatusCode::NOT_FOUND);
        assert_eq!(status_of(WorkflowError::ExpiredOrInvalidCode), StatusCode::NOT_FOUND);
        assert_eq!(status_of(WorkflowError::DuplicateAccount), StatusCode::CONFLICT);
        assert_eq!(
            status_of(WorkflowError::AlreadyApplied {
                post_id: "NREP-PRF-2024-007".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(WorkflowError::Upstream(PortError::Unexpected("db".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn upstream_detail_is_not_exposed() {
        let (_, body) = ApiError::from(WorkflowError::Upstream(PortError::Unexpected(
            "password=hunter2 host=db.internal".into(),
        )))
        .status_and_body();

        assert_eq!(body.message, INTERNAL_MESSAGE);
        assert!(!body.success);
    }
}
