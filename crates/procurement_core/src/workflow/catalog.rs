//! crates/procurement_core/src/workflow/catalog.rs
//!
//! Posts, categories and stored documents.

use tracing::{error, info};

use super::accounts::not_found_as;
use super::error::{ensure_valid, WorkflowResult};
use super::validation::{validate_new_category, validate_new_post};
use super::ProcurementWorkflow;
use crate::domain::{Category, IdKind, NewCategory, NewPost, ProcurementPost, UploadedFile};
use crate::ports::{encode, Collection, Query};

const DEFAULT_POST_STATUS: &str = "active";

impl ProcurementWorkflow {
    /// Publishes a post, with an optional attachment stored alongside it.
    pub async fn create_post(&self, form: NewPost, file: Option<UploadedFile>) -> WorkflowResult<ProcurementPost> {
        ensure_valid(validate_new_post(&form))?;

        let procure_id = self.ids.next_id(IdKind::ProcurementPost).await?;
        let other_documents = match &file {
            Some(file) => vec![self.upload(file).await?],
            None => Vec::new(),
        };

        let now = self.clock.now();
        let post = ProcurementPost {
            procure_id,
            title: form.title,
            introduction: form.introduction,
            description: form.description,
            category: form.category,
            deliverables: form.deliverables,
            submission_requirements: form.submission_requirements,
            evaluation_criteria: form.evaluation_criteria,
            terms_and_conditions: form.terms_and_conditions,
            issuance_date: form.issuance_date,
            submission_deadline: form.submission_deadline,
            questions_deadline: form.questions_deadline,
            contract_award_date: form.contract_award_date,
            created_by: form.created_by,
            status: form.status.unwrap_or_else(|| DEFAULT_POST_STATUS.to_string()),
            other_documents,
            created_at: now,
            updated_at: now,
        };

        let stored = match encode(&post) {
            Ok(fields) => {
                self.documents
                    .create_document(Collection::Posts, &post.procure_id, fields)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            error!(procure_id = %post.procure_id, error = %e, "Failed to create procurement post");
            self.discard_blobs(&post.other_documents).await;
            return Err(e.into());
        }

        info!(procure_id = %post.procure_id, title = %post.title, "Procurement post created");
        Ok(post)
    }

    pub async fn add_category(&self, form: NewCategory) -> WorkflowResult<Category> {
        ensure_valid(validate_new_category(&form))?;

        let category = Category {
            cat_id: self.ids.next_id(IdKind::Category).await?,
            name: form.name,
            description: form.description,
            classification: form.classification,
            created_at: self.clock.now(),
        };
        self.documents
            .create_document(Collection::Categories, &category.cat_id, encode(&category)?)
            .await?;

        info!(cat_id = %category.cat_id, name = %category.name, "Category added");
        Ok(category)
    }

    pub async fn list_categories(&self) -> WorkflowResult<Vec<Category>> {
        let list = self
            .documents
            .list_documents(Collection::Categories, &Query::new())
            .await?;
        let categories = list
            .items
            .into_iter()
            .map(|doc| doc.decode())
            .collect::<Result<Vec<Category>, _>>()?;
        Ok(categories)
    }

    /// The raw bytes of a stored document.
    pub async fn view_document(&self, file_id: &str) -> WorkflowResult<Vec<u8>> {
        self.blobs
            .download_blob(&self.settings.document_bucket, file_id)
            .await
            .map_err(|e| not_found_as(e, "Document not found"))
    }
}
