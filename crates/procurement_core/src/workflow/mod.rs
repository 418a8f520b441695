//! crates/procurement_core/src/workflow/mod.rs
//!
//! The procurement workflow: supplier and staff accounts, password reset, listings,
//! and the application submission pipeline. Every operation is a short chain of
//! port calls; nothing here holds state between requests.

mod accounts;
mod applications;
mod catalog;
pub mod error;
mod listings;
mod reset;
pub mod validation;

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::credentials::{default_reset_code_ttl, CredentialService};
use crate::domain::{BlobRef, Compensation, UploadedFile};
use crate::ids::IdGenerator;
use crate::ports::{
    BlobStore, Clock, CompensationLog, CounterStore, Document, DocumentList, DocumentStore,
    NotificationService, PasswordHasher, PortError, PortResult, ResetCodeStore,
};

pub use applications::StatusUpdateOutcome;
pub use error::{FieldError, WorkflowError, WorkflowResult};
pub use listings::PAGE_SIZE;
pub use reset::ResetRequestOutcome;

/// Attempts (including the inline one) before a compensation is reported as unresolved.
pub const MAX_COMPENSATION_ATTEMPTS: u32 = 5;

/// Every collaborator the workflow talks to.
#[derive(Clone)]
pub struct Ports {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub counters: Arc<dyn CounterStore>,
    pub reset_codes: Arc<dyn ResetCodeStore>,
    pub compensations: Arc<dyn CompensationLog>,
    pub notifier: Arc<dyn NotificationService>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Bucket that receives every procurement upload.
    pub document_bucket: String,
    /// Staff with an address in this domain sign in with their work email.
    pub staff_email_domain: String,
    pub reset_code_ttl: Duration,
    /// Department named in the sender of workflow emails.
    pub department: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            document_bucket: "procurement-documents".to_string(),
            staff_email_domain: "nrep.ug".to_string(),
            reset_code_ttl: default_reset_code_ttl(),
            department: "Procurement".to_string(),
        }
    }
}

/// Counts from one pass over the compensation log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub resolved: usize,
    pub failed: usize,
    pub abandoned: usize,
}

pub struct ProcurementWorkflow {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn NotificationService>,
    compensations: Arc<dyn CompensationLog>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    credentials: CredentialService,
    settings: WorkflowSettings,
}

impl ProcurementWorkflow {
    pub fn new(ports: Ports, settings: WorkflowSettings) -> Self {
        let ids = IdGenerator::new(ports.counters, ports.clock.clone());
        let credentials = CredentialService::new(
            ports.hasher,
            ports.reset_codes,
            ports.clock.clone(),
            settings.reset_code_ttl,
        );
        Self {
            documents: ports.documents,
            blobs: ports.blobs,
            notifier: ports.notifier,
            compensations: ports.compensations,
            clock: ports.clock,
            ids,
            credentials,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    /// Stores one client file in the document bucket under a fresh blob id.
    async fn upload(&self, file: &UploadedFile) -> WorkflowResult<BlobRef> {
        let id = self.ids.next_document_id().await?;
        let blob = self
            .blobs
            .upload_blob(&self.settings.document_bucket, &id, file)
            .await?;
        debug!(blob_id = %blob.id, file_name = %blob.file_name, "Uploaded file");
        Ok(blob)
    }

    /// Best-effort delete of blobs written by an aborted operation.
    ///
    /// Failures never reach the caller: each one is recorded in the compensation log
    /// and retried later by [`ProcurementWorkflow::retry_compensations`].
    async fn discard_blobs(&self, blobs: &[BlobRef]) {
        for blob in blobs {
            match self.blobs.delete_blob(&blob.bucket_id, &blob.id).await {
                Ok(()) | Err(PortError::NotFound(_)) => {
                    debug!(blob_id = %blob.id, "Discarded uploaded file");
                }
                Err(e) => {
                    warn!(blob_id = %blob.id, error = %e, "Failed to discard uploaded file; recording compensation");
                    let compensation = Compensation {
                        id: Uuid::new_v4(),
                        bucket_id: blob.bucket_id.clone(),
                        blob_id: blob.id.clone(),
                        attempts: 1,
                        last_error: e.to_string(),
                        recorded_at: self.clock.now(),
                    };
                    if let Err(log_err) = self.compensations.record(&compensation).await {
                        error!(blob_id = %blob.id, error = %log_err, "Failed to record compensation; blob is orphaned");
                    }
                }
            }
        }
    }

    /// Retries every pending compensation once.
    pub async fn retry_compensations(&self) -> PortResult<CompensationReport> {
        let mut report = CompensationReport::default();
        for pending in self.compensations.pending(MAX_COMPENSATION_ATTEMPTS).await? {
            match self.blobs.delete_blob(&pending.bucket_id, &pending.blob_id).await {
                Ok(()) | Err(PortError::NotFound(_)) => {
                    self.compensations.mark_resolved(pending.id).await?;
                    report.resolved += 1;
                }
                Err(e) => {
                    self.compensations.record_attempt(pending.id, &e.to_string()).await?;
                    if pending.attempts + 1 >= MAX_COMPENSATION_ATTEMPTS {
                        error!(
                            compensation_id = %pending.id,
                            bucket_id = %pending.bucket_id,
                            blob_id = %pending.blob_id,
                            error = %e,
                            "Unresolved compensation: giving up on blob delete, manual cleanup required"
                        );
                        report.abandoned += 1;
                    } else {
                        warn!(compensation_id = %pending.id, error = %e, "Compensation retry failed");
                        report.failed += 1;
                    }
                }
            }
        }
        Ok(report)
    }
}

/// The single document of a listing, or `None` for zero or several matches.
fn exactly_one(list: DocumentList) -> Option<Document> {
    let mut items = list.items;
    if items.len() == 1 && list.total == 1 {
        items.pop()
    } else {
        None
    }
}
