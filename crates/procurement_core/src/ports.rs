//! crates/procurement_core/src/ports.rs
//!
//! Defines the service contracts (traits) the procurement workflow depends on.
//! These traits form the boundary of the hexagonal architecture: the workflow only
//! sees documents, blobs, counters, reset codes and mail, never a concrete backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{BlobRef, Compensation, Email, ResetCodeStatus, ResetRequest, UploadedFile};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Documents
//=========================================================================================

/// The field map of a stored document.
pub type Fields = Map<String, Value>;

/// The document collections the workflow reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Suppliers,
    ProcurementStaff,
    /// Staff records owned by the HR module.
    HrStaff,
    Posts,
    Applications,
    Categories,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Suppliers => "suppliers",
            Collection::ProcurementStaff => "procurement_staff",
            Collection::HrStaff => "hr_staff",
            Collection::Posts => "posts",
            Collection::Applications => "applications",
            Collection::Categories => "categories",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Deserializes the document's fields into a domain type.
    pub fn decode<T: DeserializeOwned>(self) -> PortResult<T> {
        serde_json::from_value(Value::Object(self.fields)).map_err(|e| {
            PortError::Unexpected(format!("Malformed document {}: {}", self.id, e))
        })
    }
}

/// Serializes a domain type into document fields.
pub fn encode<T: Serialize>(value: &T) -> PortResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(PortError::Unexpected(format!(
            "Expected an object, got {}",
            other
        ))),
        Err(e) => Err(PortError::Unexpected(e.to_string())),
    }
}

/// A single predicate over a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equal(String, Value),
    LessThan(String, Value),
    GreaterThan(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Filter::Equal(field.to_string(), value.into())
    }

    pub fn less_than(field: &str, value: impl Into<Value>) -> Self {
        Filter::LessThan(field.to_string(), value.into())
    }

    pub fn greater_than(field: &str, value: impl Into<Value>) -> Self {
        Filter::GreaterThan(field.to_string(), value.into())
    }

    pub fn one_of<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Equal(f, _) | Filter::LessThan(f, _) | Filter::GreaterThan(f, _) | Filter::In(f, _) => f,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Filters, ordering and offset pagination for `list_documents`.
/// All filters are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: true,
        });
        self
    }
}

/// The result of a listing: one window of matches plus the total match count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentList {
    pub items: Vec<Document>,
    pub total: u64,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails with `AlreadyExists` if the id, or any unique key of the collection, collides.
    async fn create_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> PortResult<Document>;

    async fn get_document(&self, collection: Collection, id: &str) -> PortResult<Document>;

    async fn list_documents(&self, collection: Collection, query: &Query) -> PortResult<DocumentList>;

    /// Merges `fields` into the stored document.
    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> PortResult<Document>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_blob(&self, bucket: &str, id: &str, file: &UploadedFile) -> PortResult<BlobRef>;

    async fn download_blob(&self, bucket: &str, id: &str) -> PortResult<Vec<u8>>;

    async fn delete_blob(&self, bucket: &str, id: &str) -> PortResult<()>;
}

/// Durable sequence counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the counter stored under `key` (starting from 0) and
    /// returns the new value.
    async fn increment(&self, key: &str) -> PortResult<u64>;
}

/// The log of issued password reset codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResetCodeStore: Send + Sync {
    async fn insert(&self, request: &ResetRequest) -> PortResult<()>;

    /// The most recently issued request for this exact `(email, code)` pair.
    async fn find_latest(&self, email: &str, code: &str) -> PortResult<Option<ResetRequest>>;

    async fn set_status(&self, id: Uuid, status: ResetCodeStatus) -> PortResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends an email and returns the provider's message id.
    async fn send_email(&self, email: &Email) -> PortResult<String>;
}

/// Durable record of compensating actions that could not be completed inline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompensationLog: Send + Sync {
    async fn record(&self, compensation: &Compensation) -> PortResult<()>;

    /// Unresolved compensations with fewer than `max_attempts` attempts.
    async fn pending(&self, max_attempts: u32) -> PortResult<Vec<Compensation>>;

    async fn record_attempt(&self, id: Uuid, error: &str) -> PortResult<()>;

    async fn mark_resolved(&self, id: Uuid) -> PortResult<()>;
}

/// Slow, salted one-way password hashing.
#[cfg_attr(test, mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash_password(&self, plain: &str) -> PortResult<String>;

    fn verify_password(&self, plain: &str, hash: &str) -> PortResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
