//! services/api/src/web/applications.rs
//!
//! Application submission and review.

use crate::error::{ApiError, ErrorBody};
use crate::web::multipart::read_form;
use crate::web::rest::DataResponse;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    Json,
};
use procurement_core::{Application, DocumentSlot, NewApplication, StatusUpdate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppliedQuery {
    #[serde(rename = "supplierID")]
    pub supplier_id: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServiceDetailsQuery {
    #[serde(rename = "supplierID")]
    pub supplier_id: Option<String>,
    #[serde(rename = "applicationID", alias = "serviceID")]
    pub application_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
    pub comments: Option<String>,
}

#[derive(Serialize)]
pub struct StatusUpdateResponse {
    pub success: bool,
    pub message: String,
    pub data: Application,
    /// Whether the supplier was emailed about the change.
    pub notified: bool,
}

fn required_param(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}

/// POST /apply - Apply to a procurement service
#[utoipa::path(
    post,
    path = "/apply",
    request_body(
        content_type = "multipart/form-data",
        description = "`supplierID`, `procurementID` and the files `incorporationCertificate`, `teamCv` (required), `teamCv2`, `budget`, `otherDocument`."
    ),
    responses(
        (status = 200, description = "Application submitted"),
        (status = 400, description = "Invalid request or a required document is missing", body = ErrorBody),
        (status = 409, description = "Already applied to this service", body = ErrorBody)
    )
)]
pub async fn apply_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart).await?;
    let application = NewApplication {
        supplier_id: form.text("supplierID"),
        procurement_id: form.text("procurementID"),
    };

    let mut files = HashMap::new();
    for (field, file) in form.into_files() {
        match DocumentSlot::from_field_name(&field) {
            Some(slot) => {
                files.insert(slot, file);
            }
            None => warn!(field = %field, "Ignoring file in an unknown field"),
        }
    }

    let application = state.workflow.submit_application(files, application).await?;
    Ok(DataResponse::ok("Application submitted successfully.", application))
}

/// GET /applied - Every application of one supplier
#[utoipa::path(
    get,
    path = "/applied",
    params(AppliedQuery),
    responses(
        (status = 200, description = "Applications, newest first"),
        (status = 400, description = "supplierID is missing", body = ErrorBody)
    )
)]
pub async fn list_applied_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppliedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier_id = required_param(query.supplier_id, "supplierID")?;
    let applications = state.workflow.list_applications_by_supplier(&supplier_id).await?;
    Ok(Json(applications))
}

/// GET /applied/service-details - One application of one supplier
#[utoipa::path(
    get,
    path = "/applied/service-details",
    params(ServiceDetailsQuery),
    responses(
        (status = 200, description = "The application"),
        (status = 404, description = "Application not found", body = ErrorBody)
    )
)]
pub async fn applied_service_details_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServiceDetailsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier_id = required_param(query.supplier_id, "supplierID")?;
    let application_id = required_param(query.application_id, "applicationID")?;
    let application = state
        .workflow
        .get_application(&supplier_id, &application_id)
        .await?;
    Ok(Json(application))
}

/// PUT /applied/{applicationID}/status-update - Review an application
#[utoipa::path(
    put,
    path = "/applied/{applicationID}/status-update",
    params(("applicationID" = String, Path, description = "e.g. NREP-PRF-2024-001")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated; `notified` tells whether the supplier was emailed"),
        (status = 400, description = "Invalid status", body = ErrorBody),
        (status = 404, description = "Application not found", body = ErrorBody)
    )
)]
pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    Path(application_id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .workflow
        .update_application_status(
            &application_id,
            StatusUpdate {
                status: req.status,
                comments: req.comments,
            },
        )
        .await?;

    Ok(Json(StatusUpdateResponse {
        success: true,
        message: "Application status updated successfully.".to_string(),
        data: outcome.application,
        notified: outcome.notified,
    }))
}
