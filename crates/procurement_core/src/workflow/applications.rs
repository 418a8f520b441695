//! crates/procurement_core/src/workflow/applications.rs
//!
//! Application submission and review.
//!
//! Submission checks everything it can before the first upload: the duplicate
//! lookup and the required slots. Once uploads have started, any failure deletes
//! every blob written by the call before the error is returned.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info, warn};

use super::accounts::not_found_as;
use super::error::{ensure_valid, WorkflowError, WorkflowResult};
use super::validation::{check_one_of, require, APPLICATION_STATUSES};
use super::ProcurementWorkflow;
use crate::domain::{
    format_timestamp, Application, BlobRef, DocumentSlot, Email, IdKind, NewApplication,
    StatusUpdate, Supplier, UploadedFile,
};
use crate::ports::{encode, Collection, Fields, Filter, PortError, Query};

const INITIAL_STATUS: &str = "pending";
const LIST_CAP: u32 = 100;
const APPLICATION_NOT_FOUND: &str = "Application not found";

/// Result of a status change. The change stands even when the email did not go out.
#[derive(Debug, Clone)]
pub struct StatusUpdateOutcome {
    pub application: Application,
    pub notified: bool,
}

impl ProcurementWorkflow {
    pub async fn submit_application(
        &self,
        mut files: HashMap<DocumentSlot, UploadedFile>,
        form: NewApplication,
    ) -> WorkflowResult<Application> {
        let mut errors = Vec::new();
        require(&mut errors, "supplierID", &form.supplier_id);
        require(&mut errors, "procurementID", &form.procurement_id);
        ensure_valid(errors)?;

        let existing = self
            .documents
            .list_documents(
                Collection::Applications,
                &Query::new()
                    .filter(Filter::equal("supplierID", form.supplier_id.as_str()))
                    .filter(Filter::equal("postID", form.procurement_id.as_str()))
                    .limit(1),
            )
            .await?;
        if existing.total > 0 {
            info!(supplier_id = %form.supplier_id, post_id = %form.procurement_id, "Duplicate application rejected");
            return Err(WorkflowError::AlreadyApplied {
                post_id: form.procurement_id,
            });
        }

        if let Some(missing) = DocumentSlot::ALL
            .into_iter()
            .find(|slot| slot.is_required() && !files.contains_key(slot))
        {
            return Err(WorkflowError::MissingDocument(missing));
        }

        let mut uploaded: Vec<BlobRef> = Vec::new();
        for slot in DocumentSlot::ALL {
            let Some(file) = files.remove(&slot) else {
                continue;
            };
            match self.upload(&file).await {
                Ok(blob) => uploaded.push(blob),
                Err(e) => {
                    warn!(slot = %slot, error = %e, "Upload failed; discarding earlier uploads");
                    self.discard_blobs(&uploaded).await;
                    return Err(e);
                }
            }
        }

        match self.create_application(&form, uploaded.clone()).await {
            Ok(application) => {
                info!(
                    application_id = %application.application_id,
                    supplier_id = %application.supplier_id,
                    post_id = %application.post_id,
                    documents = application.submitted_documents.len(),
                    "Application submitted"
                );
                Ok(application)
            }
            Err(e) => {
                self.discard_blobs(&uploaded).await;
                Err(e)
            }
        }
    }

    async fn create_application(
        &self,
        form: &NewApplication,
        submitted_documents: Vec<BlobRef>,
    ) -> WorkflowResult<Application> {
        let application_id = self.ids.next_id(IdKind::ProcurementRequest).await?;
        let now = self.clock.now();
        let application = Application {
            application_id,
            post_id: form.procurement_id.clone(),
            supplier_id: form.supplier_id.clone(),
            submitted_documents,
            status: INITIAL_STATUS.to_string(),
            comments: None,
            created_at: now,
            updated_at: now,
        };

        match self
            .documents
            .create_document(
                Collection::Applications,
                &application.application_id,
                encode(&application)?,
            )
            .await
        {
            Ok(_) => Ok(application),
            Err(PortError::AlreadyExists(detail)) => {
                warn!(detail = %detail, "Concurrent duplicate application caught at insert");
                Err(WorkflowError::AlreadyApplied {
                    post_id: application.post_id,
                })
            }
            Err(e) => {
                error!(application_id = %application.application_id, error = %e, "Failed to create application");
                Err(e.into())
            }
        }
    }

    pub async fn list_applications_by_supplier(&self, supplier_id: &str) -> WorkflowResult<Vec<Application>> {
        let list = self
            .documents
            .list_documents(
                Collection::Applications,
                &Query::new()
                    .filter(Filter::equal("supplierID", supplier_id))
                    .order_by_desc("createdAt")
                    .limit(LIST_CAP),
            )
            .await?;
        let applications = list
            .items
            .into_iter()
            .map(|doc| doc.decode())
            .collect::<Result<Vec<Application>, _>>()?;
        Ok(applications)
    }

    /// An application, only if it belongs to `supplier_id`.
    pub async fn get_application(&self, supplier_id: &str, application_id: &str) -> WorkflowResult<Application> {
        let application = self.load_application(application_id).await?;
        if application.supplier_id != supplier_id {
            return Err(WorkflowError::NotFound(APPLICATION_NOT_FOUND.to_string()));
        }
        Ok(application)
    }

    pub async fn update_application_status(
        &self,
        application_id: &str,
        update: StatusUpdate,
    ) -> WorkflowResult<StatusUpdateOutcome> {
        let mut errors = Vec::new();
        check_one_of(&mut errors, "status", &update.status, &APPLICATION_STATUSES);
        ensure_valid(errors)?;

        self.load_application(application_id).await?;

        let mut fields = Fields::new();
        fields.insert("status".into(), Value::String(update.status.clone()));
        if let Some(comments) = &update.comments {
            fields.insert("comments".into(), Value::String(comments.clone()));
        }
        fields.insert("updatedAt".into(), Value::String(format_timestamp(&self.clock.now())));
        let application: Application = self
            .documents
            .update_document(Collection::Applications, application_id, fields)
            .await?
            .decode()?;
        info!(application_id = %application_id, status = %application.status, "Application status updated");

        let notified = self.notify_status_change(&application).await;
        Ok(StatusUpdateOutcome {
            application,
            notified,
        })
    }

    async fn load_application(&self, application_id: &str) -> WorkflowResult<Application> {
        let application = self
            .documents
            .get_document(Collection::Applications, application_id)
            .await
            .map_err(|e| not_found_as(e, APPLICATION_NOT_FOUND))?
            .decode()?;
        Ok(application)
    }

    async fn notify_status_change(&self, application: &Application) -> bool {
        let supplier: Supplier = match self
            .documents
            .get_document(Collection::Suppliers, &application.supplier_id)
            .await
            .and_then(|doc| doc.decode())
        {
            Ok(supplier) => supplier,
            Err(e) => {
                warn!(supplier_id = %application.supplier_id, error = %e, "Cannot notify supplier of status change");
                return false;
            }
        };

        let email = status_email(&supplier, application, &self.settings.department);
        match self.notifier.send_email(&email).await {
            Ok(_) => true,
            Err(e) => {
                warn!(application_id = %application.application_id, error = %e, "Failed to send status notification");
                false
            }
        }
    }
}

fn status_email(supplier: &Supplier, application: &Application, department: &str) -> Email {
    let mut body = format!(
        "<p>Dear {},</p>\
         <p>The status of your application {} for procurement {} is now <strong>{}</strong>.</p>",
        supplier.contact_person, application.application_id, application.post_id, application.status
    );
    if let Some(comments) = &application.comments {
        body.push_str(&format!("<p>Comments: {comments}</p>"));
    }
    body.push_str("<p>Regards,<br/>NREP Procurement</p>");

    Email {
        to: vec![supplier.account_email.clone()],
        cc: supplier.company_email.iter().cloned().collect(),
        subject: format!("Application {} status update", application.application_id),
        html: Some(body),
        department: Some(department.to_string()),
        ..Email::default()
    }
}
