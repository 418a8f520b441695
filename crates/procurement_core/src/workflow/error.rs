//! crates/procurement_core/src/workflow/error.rs
//!
//! The tagged outcomes of workflow operations.

use serde::Serialize;

use crate::domain::DocumentSlot;
use crate::ports::PortError;

/// One problem with one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid request")]
    Validation(Vec<FieldError>),

    #[error("{0} is required and was not provided.")]
    MissingDocument(DocumentSlot),

    #[error("{0}")]
    NotFound(String),

    #[error("No account is registered with this email address.")]
    UnknownEmail,

    #[error("The company email or selected login email is already in use.")]
    DuplicateAccount,

    #[error("Failed to create account")]
    AccountCreationFailed(#[source] PortError),

    #[error("Already applied for this procurement (REF.No.: {post_id}).")]
    AlreadyApplied { post_id: String },

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("The reset code is invalid or has expired.")]
    ExpiredOrInvalidCode,

    #[error("Upstream service failure")]
    Upstream(#[from] PortError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Turns collected field errors into a `Validation` failure.
pub(crate) fn ensure_valid(errors: Vec<FieldError>) -> WorkflowResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(errors))
    }
}
