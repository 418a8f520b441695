pub mod applications;
pub mod auth;
pub mod compensation_task;
pub mod documents;
pub mod middleware;
pub mod multipart;
pub mod rest;
pub mod services;
pub mod state;
pub mod suppliers;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

pub use compensation_task::compensation_process;
pub use state::AppState;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}

/// Every API route, with CORS, the upload size limit and request logging applied.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(rest::health_handler))
        // Accounts
        .route("/staff-register", post(auth::staff_register_handler))
        .route("/supplier-register", post(suppliers::supplier_register_handler))
        .route("/sign-in", post(auth::sign_in_handler))
        .route("/request-password-reset", post(auth::request_password_reset_handler))
        .route("/validate-otp-password-reset", post(auth::validate_reset_code_handler))
        .route("/set-new-password", post(auth::set_new_password_handler))
        // Suppliers
        .route("/suppliers", get(suppliers::list_suppliers_handler))
        .route("/suppliers/pages", get(suppliers::list_suppliers_page_handler))
        .route("/get-supplier/{supplierID}", get(suppliers::get_supplier_handler))
        // Services
        .route("/add-service", post(services::add_service_handler))
        .route("/get-service/{procureID}", get(services::get_service_handler))
        .route("/services", get(services::list_services_handler))
        .route("/services/pages/status", get(services::list_services_page_handler))
        .route("/categories", post(services::add_category_handler))
        .route("/get-categories", get(services::list_categories_handler))
        // Applications
        .route("/apply", post(applications::apply_handler))
        .route("/applied", get(applications::list_applied_handler))
        .route(
            "/applied/service-details",
            get(applications::applied_service_details_handler),
        )
        .route(
            "/applied/{applicationID}/status-update",
            put(applications::update_status_handler),
        )
        .route("/document/view/{fileId}", get(documents::view_document_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(middleware::log_requests))
        .layer(cors)
        .with_state(state)
}
