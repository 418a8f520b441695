//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, the response envelopes
//! shared by every handler, and the liveness endpoint.

use crate::error::{ErrorBody, FieldErrorBody};
use crate::web::{applications, auth, documents, services, suppliers};
use axum::response::Json;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::staff_register_handler,
        auth::sign_in_handler,
        auth::request_password_reset_handler,
        auth::validate_reset_code_handler,
        auth::set_new_password_handler,
        suppliers::supplier_register_handler,
        suppliers::list_suppliers_handler,
        suppliers::list_suppliers_page_handler,
        suppliers::get_supplier_handler,
        services::add_service_handler,
        services::get_service_handler,
        services::list_services_handler,
        services::list_services_page_handler,
        services::add_category_handler,
        services::list_categories_handler,
        applications::apply_handler,
        applications::list_applied_handler,
        applications::applied_service_details_handler,
        applications::update_status_handler,
        documents::view_document_handler,
    ),
    components(
        schemas(
            MessageResponse,
            HealthResponse,
            ErrorBody,
            FieldErrorBody,
            auth::StaffRegisterRequest,
            auth::SignInRequest,
            auth::ResetEmailRequest,
            auth::ResetCodeRequest,
            auth::NewPasswordRequest,
            auth::ResetRequestedResponse,
            services::CategoryRequest,
            applications::StatusUpdateRequest,
        )
    ),
    tags(
        (name = "NREP Procurement API", description = "Supplier accounts, procurement services and applications.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Envelopes
//=========================================================================================

/// A bare acknowledgement.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// An acknowledgement carrying the affected record.
#[derive(Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is running", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
