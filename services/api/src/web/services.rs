//! services/api/src/web/services.rs
//!
//! Procurement services ("posts"): publishing, lookup, listings and categories.

use crate::error::{ApiError, ErrorBody};
use crate::web::multipart::{read_form, FormData};
use crate::web::rest::DataResponse;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use procurement_core::{FieldError, NewCategory, NewPost, PostFilter, WorkflowError};
use serde::{de, Deserialize, Deserializer};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// The multipart field holding the optional attachment of a new service.
pub const SERVICE_DOCUMENT_FIELD: &str = "otherDocuments";

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServiceListQuery {
    /// Ignore the submission deadline. A bare `?all` counts as true.
    #[serde(default, deserialize_with = "flag")]
    pub all: bool,
    /// Only services whose deadline has passed. A bare `?expired` counts as true.
    #[serde(default, deserialize_with = "flag")]
    pub expired: bool,
    pub status: Option<String>,
}

/// Reads a query flag, where a present but empty value means `true`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "" | "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(de::Error::custom(format!("invalid flag value: {other}"))),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub classification: Vec<String>,
}

//=========================================================================================
// Form Parsing
//=========================================================================================

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn optional_date(form: &FormData, field: &str, errors: &mut Vec<FieldError>) -> Option<DateTime<Utc>> {
    let raw = form.optional(field)?;
    let parsed = parse_date(&raw);
    if parsed.is_none() {
        errors.push(FieldError::new(
            field,
            format!("{field} must be a date (YYYY-MM-DD) or an RFC 3339 timestamp"),
        ));
    }
    parsed
}

fn required_date(form: &FormData, field: &str, errors: &mut Vec<FieldError>) -> Option<DateTime<Utc>> {
    if form.optional(field).is_none() {
        errors.push(FieldError::new(field, format!("{field} is required")));
        return None;
    }
    optional_date(form, field, errors)
}

fn post_form(form: &FormData) -> Result<NewPost, ApiError> {
    let mut errors = Vec::new();
    let issuance_date = required_date(form, "issuanceDate", &mut errors);
    let submission_deadline = required_date(form, "submissionDeadline", &mut errors);
    let questions_deadline = optional_date(form, "questionsDeadline", &mut errors);
    let contract_award_date = optional_date(form, "contractAwardDate", &mut errors);

    let (Some(issuance_date), Some(submission_deadline), true) =
        (issuance_date, submission_deadline, errors.is_empty())
    else {
        return Err(WorkflowError::Validation(errors).into());
    };

    Ok(NewPost {
        title: form.text("title"),
        introduction: form.optional("introduction"),
        description: form.text("description"),
        category: form.text("category"),
        deliverables: form.list("deliverables"),
        submission_requirements: form.list("submissionRequirements"),
        evaluation_criteria: form.list("evaluationCriteria"),
        terms_and_conditions: form.list("termsAndConditions"),
        issuance_date,
        submission_deadline,
        questions_deadline,
        contract_award_date,
        created_by: form.optional("createdBy"),
        status: form.optional("status"),
    })
}

/// `page` plus any number of `statuses` (repeated, `statuses[]`, or comma separated).
fn page_and_statuses(params: Vec<(String, String)>) -> Result<(u32, Vec<String>), ApiError> {
    let mut page = 1;
    let mut statuses = Vec::new();
    for (key, value) in params {
        match key.as_str() {
            "page" => {
                page = value.trim().parse().map_err(|_| {
                    WorkflowError::Validation(vec![FieldError::new(
                        "page",
                        "page must be a positive integer",
                    )])
                })?;
            }
            "statuses" | "statuses[]" => statuses.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            ),
            _ => {}
        }
    }
    Ok((page, statuses))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /add-service - Publish a procurement service
#[utoipa::path(
    post,
    path = "/add-service",
    request_body(content_type = "multipart/form-data", description = "Service fields plus an optional `otherDocuments` file."),
    responses(
        (status = 201, description = "Service created"),
        (status = 400, description = "Invalid request", body = ErrorBody)
    )
)]
pub async fn add_service_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_form(multipart).await?;
    let attachment = form.take_file(SERVICE_DOCUMENT_FIELD);
    let post = state.workflow.create_post(post_form(&form)?, attachment).await?;

    Ok((
        StatusCode::CREATED,
        DataResponse::ok("Procurement service created successfully.", post),
    ))
}

/// GET /get-service/{procureID} - One procurement service
#[utoipa::path(
    get,
    path = "/get-service/{procureID}",
    params(("procureID" = String, Path, description = "e.g. NREP-PS-2024-001")),
    responses(
        (status = 200, description = "The service"),
        (status = 404, description = "Procurement service not found", body = ErrorBody)
    )
)]
pub async fn get_service_handler(
    State(state): State<Arc<AppState>>,
    Path(procure_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.workflow.get_post(&procure_id).await?;
    Ok(Json(post))
}

/// GET /services - Open, expired or all services (at most 100)
#[utoipa::path(
    get,
    path = "/services",
    params(ServiceListQuery),
    responses((status = 200, description = "Services, newest first"))
)]
pub async fn list_services_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServiceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = state
        .workflow
        .list_posts(PostFilter {
            all: query.all,
            expired: query.expired,
            status: query.status.filter(|s| !s.trim().is_empty()),
        })
        .await?;
    Ok(Json(posts))
}

/// GET /services/pages/status - One page of services, optionally by status
#[utoipa::path(
    get,
    path = "/services/pages/status",
    params(
        ("page" = Option<u32>, Query, description = "1-based page number"),
        ("statuses" = Option<Vec<String>>, Query, description = "Any of active, pending, closed")
    ),
    responses(
        (status = 200, description = "`{documents, currentPage, hasNextPage, totalDocuments}`"),
        (status = 400, description = "Invalid page or status", body = ErrorBody)
    )
)]
pub async fn list_services_page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, statuses) = page_and_statuses(params)?;
    let page = state.workflow.list_posts_page(page, &statuses).await?;
    Ok(Json(page))
}

/// POST /categories - Add a service category
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created"),
        (status = 400, description = "Invalid request", body = ErrorBody)
    )
)]
pub async fn add_category_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .workflow
        .add_category(NewCategory {
            name: req.name,
            description: req.description,
            classification: req.classification,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        DataResponse::ok("Category created successfully.", category),
    ))
}

/// GET /get-categories - Every service category
#[utoipa::path(
    get,
    path = "/get-categories",
    responses((status = 200, description = "Categories"))
)]
pub async fn list_categories_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.workflow.list_categories().await?;
    Ok(Json(categories))
}
