//! crates/procurement_core/src/workflow/listings.rs

use futures::future::try_join_all;
use serde::de::DeserializeOwned;

use super::accounts::not_found_as;
use super::error::{ensure_valid, WorkflowResult};
use super::validation::{check_one_of, check_page, POST_STATUSES};
use super::ProcurementWorkflow;
use crate::domain::{
    format_timestamp, Page, PostFilter, ProcurementPost, Supplier, SupplierSummary, SupplierView,
};
use crate::ports::{Collection, DocumentList, Filter, PortResult, Query};

/// Items per page of every paginated listing.
pub const PAGE_SIZE: u32 = 8;

/// Upper bound for the unpaginated listings.
const LIST_CAP: u32 = 100;

fn decode_all<T: DeserializeOwned>(list: DocumentList) -> PortResult<Vec<T>> {
    list.items.into_iter().map(|doc| doc.decode()).collect()
}

/// Pages past the addressable range saturate, so they come back empty.
fn offset_of(page: u32) -> u32 {
    page.saturating_sub(1).saturating_mul(PAGE_SIZE)
}

fn page_of<T>(items: Vec<T>, page: u32, total: u64) -> Page<T> {
    let seen = u64::from(offset_of(page)) + items.len() as u64;
    Page {
        has_next_page: seen < total,
        items,
        page,
        total,
    }
}

impl ProcurementWorkflow {
    /// Posts by deadline and status, newest first, at most 100 of them.
    pub async fn list_posts(&self, filter: PostFilter) -> WorkflowResult<Vec<ProcurementPost>> {
        let mut query = Query::new().order_by_desc("createdAt").limit(LIST_CAP);
        if !filter.all {
            let now = format_timestamp(&self.clock.now());
            query = if filter.expired {
                query.filter(Filter::less_than("submissionDeadline", now))
            } else {
                query.filter(Filter::greater_than("submissionDeadline", now))
            };
        }
        if let Some(status) = filter.status.filter(|s| !s.is_empty()) {
            query = query.filter(Filter::equal("status", status));
        }

        let list = self.documents.list_documents(Collection::Posts, &query).await?;
        Ok(decode_all(list)?)
    }

    pub async fn list_posts_page(
        &self,
        page: u32,
        statuses: &[String],
    ) -> WorkflowResult<Page<ProcurementPost>> {
        let mut errors = Vec::new();
        check_page(&mut errors, page);
        for status in statuses {
            check_one_of(&mut errors, "statuses", status, &POST_STATUSES);
        }
        ensure_valid(errors)?;

        let mut query = Query::new()
            .order_by_desc("createdAt")
            .limit(PAGE_SIZE)
            .offset(offset_of(page));
        if !statuses.is_empty() {
            query = query.filter(Filter::one_of("status", statuses.iter().cloned()));
        }

        let list = self.documents.list_documents(Collection::Posts, &query).await?;
        let total = list.total;
        Ok(page_of(decode_all(list)?, page, total))
    }

    pub async fn get_post(&self, procure_id: &str) -> WorkflowResult<ProcurementPost> {
        let post = self
            .documents
            .get_document(Collection::Posts, procure_id)
            .await
            .map_err(|e| not_found_as(e, "Procurement service not found"))?
            .decode()?;
        Ok(post)
    }

    pub async fn list_suppliers(&self, validated: Option<bool>) -> WorkflowResult<Vec<SupplierView>> {
        let list = self
            .documents
            .list_documents(Collection::Suppliers, &supplier_query(validated).limit(LIST_CAP))
            .await?;
        let suppliers: Vec<Supplier> = decode_all(list)?;
        Ok(suppliers.into_iter().map(SupplierView::from).collect())
    }

    /// One page of suppliers, each with the number of applications it has submitted.
    pub async fn list_suppliers_page(
        &self,
        page: u32,
        validated: Option<bool>,
    ) -> WorkflowResult<Page<SupplierSummary>> {
        let mut errors = Vec::new();
        check_page(&mut errors, page);
        ensure_valid(errors)?;

        let query = supplier_query(validated).limit(PAGE_SIZE).offset(offset_of(page));
        let list = self.documents.list_documents(Collection::Suppliers, &query).await?;
        let total = list.total;
        let suppliers: Vec<Supplier> = decode_all(list)?;

        let counts = try_join_all(
            suppliers
                .iter()
                .map(|supplier| self.count_applications(&supplier.supplier_id)),
        )
        .await?;

        let items = suppliers
            .into_iter()
            .zip(counts)
            .map(|(supplier, application_count)| SupplierSummary {
                supplier: supplier.into(),
                application_count,
            })
            .collect();
        Ok(page_of(items, page, total))
    }

    async fn count_applications(&self, supplier_id: &str) -> PortResult<u64> {
        let query = Query::new()
            .filter(Filter::equal("supplierID", supplier_id))
            .limit(0);
        Ok(self
            .documents
            .list_documents(Collection::Applications, &query)
            .await?
            .total)
    }
}

fn supplier_query(validated: Option<bool>) -> Query {
    let query = Query::new().order_by_desc("createdAt");
    match validated {
        Some(validated) => query.filter(Filter::equal("validated", validated)),
        None => query,
    }
}
