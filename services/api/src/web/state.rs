//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and how it is assembled from the
//! configured backends.

use crate::adapters::{Argon2Hasher, DbAdapter, FileCounterStore, LogMailer, PostmarkMailer};
use crate::config::{Config, StoreBackend};
use crate::error::ApiError;
use procurement_core::memory::{
    InMemoryBlobStore, InMemoryCompensationLog, InMemoryCounterStore, InMemoryDocumentStore,
    InMemoryResetCodeStore,
};
use procurement_core::ports::{CounterStore, NotificationService};
use procurement_core::{Ports, ProcurementWorkflow, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<ProcurementWorkflow>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(ports: Ports, config: Config) -> Self {
        let workflow = ProcurementWorkflow::new(ports, config.workflow_settings());
        Self {
            workflow: Arc::new(workflow),
            config: Arc::new(config),
        }
    }

    /// Connects every port for the configured backend. With Postgres this also
    /// runs the pending migrations.
    pub async fn connect(config: Config) -> Result<Self, ApiError> {
        let notifier: Arc<dyn NotificationService> = match &config.postmark {
            Some(postmark) => Arc::new(PostmarkMailer::new(
                &postmark.api_token,
                postmark.base_url.clone(),
                config.email_from.clone(),
                config.email_reply_to.clone(),
            )?),
            None => {
                warn!("POSTMARK_API_TOKEN is not set; emails will only be logged.");
                Arc::new(LogMailer::new(config.email_from.clone()))
            }
        };
        let hasher = Arc::new(Argon2Hasher::new());
        let clock = Arc::new(SystemClock);

        let ports = match &config.store {
            StoreBackend::Postgres {
                database_url,
                max_connections,
            } => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(database_url)
                    .await?;
                let db = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db.run_migrations().await?;
                info!("Database migrations complete.");

                Ports {
                    documents: db.clone(),
                    blobs: db.clone(),
                    counters: db.clone(),
                    reset_codes: db.clone(),
                    compensations: db,
                    notifier,
                    hasher,
                    clock,
                }
            }
            StoreBackend::Memory => {
                warn!("Using in-memory stores; accounts, posts and applications are lost on restart.");
                let counters: Arc<dyn CounterStore> = match &config.counter_file {
                    Some(path) => {
                        info!(path = %path.display(), "Persisting sequence counters to file");
                        Arc::new(FileCounterStore::new(path.clone()))
                    }
                    None => Arc::new(InMemoryCounterStore::default()),
                };

                Ports {
                    documents: Arc::new(InMemoryDocumentStore::procurement()),
                    blobs: Arc::new(InMemoryBlobStore::default()),
                    counters,
                    reset_codes: Arc::new(InMemoryResetCodeStore::default()),
                    compensations: Arc::new(InMemoryCompensationLog::default()),
                    notifier,
                    hasher,
                    clock,
                }
            }
        };

        Ok(Self::new(ports, config))
    }
}
