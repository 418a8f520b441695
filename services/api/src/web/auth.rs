//! services/api/src/web/auth.rs
//!
//! Account endpoints: staff provisioning, sign-in, and the three-step password reset.

use crate::error::{ApiError, ErrorBody};
use crate::web::rest::{DataResponse, MessageResponse};
use crate::web::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use procurement_core::domain::UserType;
use procurement_core::{FieldError, NewStaffAccount, StaffIdentity, SupplierView, WorkflowError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct StaffRegisterRequest {
    #[serde(rename = "staffID", default)]
    pub staff_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "userType", default)]
    pub user_type: Vec<String>,
}

/// `userType` arrives either as a single value or as a list.
#[derive(Deserialize, ToSchema)]
#[serde(untagged)]
pub enum UserTypeField {
    One(String),
    Many(Vec<String>),
}

impl UserTypeField {
    fn includes(&self, wanted: &str) -> bool {
        match self {
            UserTypeField::One(value) => value == wanted,
            UserTypeField::Many(values) => values.iter().any(|v| v == wanted),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SignInRequest {
    #[serde(default, alias = "userID")]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "userType")]
    pub user_type: Option<UserTypeField>,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetEmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct NewPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    #[serde(rename = "newPassword", default)]
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct ResetRequestedResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "emailSent")]
    pub email_sent: bool,
}

/// Whoever signed in.
#[derive(Serialize)]
#[serde(untagged)]
pub enum SignedIn {
    Supplier(SupplierView),
    Staff(StaffIdentity),
}

fn user_type_of(field: Option<&UserTypeField>) -> Result<UserType, ApiError> {
    match field {
        Some(f) if f.includes("supplier") => Ok(UserType::Supplier),
        Some(f) if f.includes("staff") => Ok(UserType::Staff),
        _ => Err(WorkflowError::Validation(vec![FieldError::new(
            "userType",
            "userType must be one of supplier, staff",
        )])
        .into()),
    }
}

/// Sign-in reports unknown accounts as 401, like a wrong password.
fn sign_in_error(e: WorkflowError) -> ApiError {
    match e {
        WorkflowError::NotFound(message) => ApiError::Unauthorized(message),
        other => other.into(),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /staff-register - Provision an HR staff member for procurement
#[utoipa::path(
    post,
    path = "/staff-register",
    request_body = StaffRegisterRequest,
    responses(
        (status = 201, description = "Staff account created"),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "No HR record for this staff ID", body = ErrorBody),
        (status = 409, description = "Already provisioned", body = ErrorBody)
    )
)]
pub async fn staff_register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StaffRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .workflow
        .sign_up_staff(NewStaffAccount {
            staff_id: req.staff_id,
            role: req.role,
            user_type: req.user_type,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        DataResponse::ok("Staff Account Created successfully!", account),
    ))
}

/// POST /sign-in - Sign in as a supplier or a staff member
#[utoipa::path(
    post,
    path = "/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in; `data` holds the account without its password"),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Unknown account or wrong password", body = ErrorBody)
    )
)]
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in = match user_type_of(req.user_type.as_ref())? {
        UserType::Supplier => state
            .workflow
            .sign_in_supplier(&req.email, &req.password)
            .await
            .map(SignedIn::Supplier),
        UserType::Staff => state
            .workflow
            .sign_in_staff(&req.email, &req.password)
            .await
            .map(SignedIn::Staff),
    }
    .map_err(sign_in_error)?;

    Ok(DataResponse::ok("Sign in successful", signed_in))
}

/// POST /request-password-reset - Email a one-time reset code
#[utoipa::path(
    post,
    path = "/request-password-reset",
    request_body = ResetEmailRequest,
    responses(
        (status = 201, description = "Code issued", body = ResetRequestedResponse),
        (status = 404, description = "No account with this email", body = ErrorBody)
    )
)]
pub async fn request_password_reset_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.workflow.request_reset(&req.email).await?;

    let message = if outcome.email_sent {
        format!("A password reset code has been sent to your email ({}).", req.email)
    } else {
        "A password reset code was issued, but the email could not be delivered. Please try again shortly.".to_string()
    };

    Ok((
        StatusCode::CREATED,
        Json(ResetRequestedResponse {
            success: true,
            message,
            email_sent: outcome.email_sent,
        }),
    ))
}

/// POST /validate-otp-password-reset - Confirm a reset code; each code confirms once
#[utoipa::path(
    post,
    path = "/validate-otp-password-reset",
    request_body = ResetCodeRequest,
    responses(
        (status = 200, description = "The code is valid", body = MessageResponse),
        (status = 404, description = "The code is invalid or has expired", body = ErrorBody)
    )
)]
pub async fn validate_reset_code_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.confirm_code(&req.email, &req.code).await?;
    Ok(MessageResponse::ok("Code verified successfully."))
}

/// POST /set-new-password - Replace the password using a verified code
#[utoipa::path(
    post,
    path = "/set-new-password",
    request_body = NewPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "The code is invalid, used, or has expired", body = ErrorBody)
    )
)]
pub async fn set_new_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .workflow
        .change_password(&req.email, &req.code, &req.new_password)
        .await?;
    Ok(MessageResponse::ok("Password changed successfully."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<SignInRequest, serde_json::Error> {
        serde_json::from_str(body)
    }

    #[test]
    fn user_type_accepts_a_value_or_a_list() -> Result<(), serde_json::Error> {
        let single = parse(r#"{"email":"a@co.com","password":"x","userType":"staff"}"#)?;
        let list = parse(r#"{"userID":"a@co.com","password":"x","userType":["supplier"]}"#)?;

        assert!(matches!(user_type_of(single.user_type.as_ref()), Ok(UserType::Staff)));
        assert!(matches!(user_type_of(list.user_type.as_ref()), Ok(UserType::Supplier)));
        assert_eq!(list.email, "a@co.com");
        Ok(())
    }

    #[test]
    fn unknown_user_types_are_rejected() -> Result<(), serde_json::Error> {
        let admin = parse(r#"{"email":"a@co.com","password":"x","userType":"admin"}"#)?;
        let missing = parse(r#"{"email":"a@co.com","password":"x"}"#)?;

        assert!(matches!(
            user_type_of(admin.user_type.as_ref()),
            Err(ApiError::Workflow(WorkflowError::Validation(_)))
        ));
        assert!(user_type_of(missing.user_type.as_ref()).is_err());
        Ok(())
    }

    #[test]
    fn missing_accounts_sign_in_as_unauthorized() {
        let e = sign_in_error(WorkflowError::NotFound("No account found".into()));
        assert!(matches!(e, ApiError::Unauthorized(m) if m == "No account found"));
    }
}
