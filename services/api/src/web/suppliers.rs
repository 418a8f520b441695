//! services/api/src/web/suppliers.rs
//!
//! Supplier registration and the supplier directory.

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
use procurement_core::NewSupplier;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

/// The multipart field holding the optional company profile document.
pub const SUPPLIER_DOCUMENT_FIELD: &str = "documents";

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SupplierListQuery {
    /// Only suppliers with this validation state.
    pub validated: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SupplierPageQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    pub validated: Option<bool>,
}

fn supplier_form(form: &FormData) -> NewSupplier {
    NewSupplier {
        company_name: form.text("companyName"),
        contact_person: form.text("contactPerson"),
        account_email: form.text("accountEmail"),
        password: form.text("password"),
        company_email: form.optional("companyEmail"),
        phone: form.text("phone"),
        address: form.text("address"),
        country: form.text("country"),
        city: form.text("city"),
        website: form.optional("website"),
        products_services: form.list("productsServices"),
    }
}

/// POST /supplier-register - Register a supplier account
#[utoipa::path(
    post,
    path = "/supplier-register",
    request_body(content_type = "multipart/form-data", description = "Registration fields plus an optional `documents` file."),
    responses(
        (status = 201, description = "Supplier account created"),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "The email is already registered", body = ErrorBody),
        (status = 500, description = "Failed to create account", body = ErrorBody)
    )
)]
pub async fn supplier_register_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_form(multipart).await?;
    let document = form.take_file(SUPPLIER_DOCUMENT_FIELD);
    let supplier = state
        .workflow
        .sign_up_supplier(supplier_form(&form), document)
        .await?;

    Ok((
        StatusCode::CREATED,
        DataResponse::ok("Supplier Account Created successfully!", supplier),
    ))
}

/// GET /suppliers - Every supplier, newest first (at most 100)
#[utoipa::path(
    get,
    path = "/suppliers",
    params(SupplierListQuery),
    responses((status = 200, description = "Suppliers without their password hashes"))
)]
pub async fn list_suppliers_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SupplierListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let suppliers = state.workflow.list_suppliers(query.validated).await?;
    Ok(Json(suppliers))
}

/// GET /suppliers/pages - One page of suppliers with their application counts
#[utoipa::path(
    get,
    path = "/suppliers/pages",
    params(SupplierPageQuery),
    responses(
        (status = 200, description = "`{documents, currentPage, hasNextPage, totalDocuments}`"),
        (status = 400, description = "Invalid page", body = ErrorBody)
    )
)]
pub async fn list_suppliers_page_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SupplierPageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .workflow
        .list_suppliers_page(query.page.unwrap_or(1), query.validated)
        .await?;
    Ok(Json(page))
}

/// GET /get-supplier/{supplierID} - One supplier
#[utoipa::path(
    get,
    path = "/get-supplier/{supplierID}",
    params(("supplierID" = String, Path, description = "e.g. NREP-SPL-2024-001")),
    responses(
        (status = 200, description = "The supplier without its password hash"),
        (status = 404, description = "Supplier not found", body = ErrorBody)
    )
)]
pub async fn get_supplier_handler(
    State(state): State<Arc<AppState>>,
    Path(supplier_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state.workflow.get_supplier(&supplier_id).await?;
    Ok(Json(supplier))
}
