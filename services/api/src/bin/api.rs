//! services/api/src/bin/api.rs

use procurement_api::{
    config::Config,
    error::ApiError,
    web::{compensation_process, rest::ApiDoc, router, AppState},
};
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for the shutdown signal: {}", e);
    }
    info!("Shutdown signal received.");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect the Storage and Mail Backends ---
    let bind_address = config.bind_address;
    let retry_every = config.compensation_retry;
    let app_state = Arc::new(AppState::connect(config).await?);

    // --- 3. Start the Compensation Retry Task ---
    let shutdown = CancellationToken::new();
    let retry_task = tokio::spawn(compensation_process(
        app_state.workflow.clone(),
        retry_every,
        shutdown.clone(),
    ));

    // --- 4. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = retry_task.await {
        return Err(ApiError::Internal(format!("Compensation retry task panicked: {}", e)));
    }
    info!("Server stopped.");
    Ok(())
}
