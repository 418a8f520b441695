//! crates/procurement_core/src/memory.rs
//!
//! In-process implementations of the persistence ports. They back the `memory`
//! storage mode of the service and the workflow tests.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{BlobRef, Compensation, Email, ResetCodeStatus, ResetRequest, UploadedFile};
use crate::ports::{
    BlobStore, Collection, CompensationLog, CounterStore, Document, DocumentList, DocumentStore,
    Fields, Filter, NotificationService, PortError, PortResult, Query, ResetCodeStore,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//=========================================================================================
// Documents
//=========================================================================================

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<Collection, Vec<Document>>>,
    unique_keys: HashMap<Collection, Vec<Vec<String>>>,
}

impl InMemoryDocumentStore {
    /// A store with the same unique keys as the production schema.
    pub fn procurement() -> Self {
        Self::default()
            .with_unique_key(Collection::Suppliers, &["accountEmail"])
            .with_unique_key(Collection::Applications, &["supplierID", "postID"])
    }

    /// Rejects documents whose values for `fields` all equal an existing document's.
    pub fn with_unique_key(mut self, collection: Collection, fields: &[&str]) -> Self {
        self.unique_keys
            .entry(collection)
            .or_default()
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Inserts a document as-is, bypassing unique keys. Used to seed HR data.
    pub fn seed(&self, collection: Collection, id: &str, fields: Fields) {
        lock(&self.collections).entry(collection).or_default().push(Document {
            id: id.to_string(),
            fields,
        });
    }

    pub fn count(&self, collection: Collection) -> usize {
        lock(&self.collections).get(&collection).map_or(0, Vec::len)
    }

    fn violates_unique_key(&self, collection: Collection, existing: &[Document], fields: &Fields) -> bool {
        let Some(keys) = self.unique_keys.get(&collection) else {
            return false;
        };
        keys.iter().any(|key| {
            existing.iter().any(|doc| {
                key.iter().all(|f| match (doc.fields.get(f), fields.get(f)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                })
            })
        })
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches(filter: &Filter, fields: &Fields) -> bool {
    let Some(actual) = fields.get(filter.field()) else {
        return false;
    };
    match filter {
        Filter::Equal(_, expected) => actual == expected,
        Filter::LessThan(_, bound) => compare(actual, bound) == Some(Ordering::Less),
        Filter::GreaterThan(_, bound) => compare(actual, bound) == Some(Ordering::Greater),
        Filter::In(_, values) => values.contains(actual),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> PortResult<Document> {
        let mut collections = lock(&self.collections);
        let documents = collections.entry(collection).or_default();
        if documents.iter().any(|d| d.id == id) {
            return Err(PortError::AlreadyExists(format!("{} {}", collection.as_str(), id)));
        }
        if self.violates_unique_key(collection, documents, &fields) {
            return Err(PortError::AlreadyExists(format!(
                "{} unique key for {}",
                collection.as_str(),
                id
            )));
        }
        let document = Document {
            id: id.to_string(),
            fields,
        };
        documents.push(document.clone());
        Ok(document)
    }

    async fn get_document(&self, collection: Collection, id: &str) -> PortResult<Document> {
        lock(&self.collections)
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("{} {}", collection.as_str(), id)))
    }

    async fn list_documents(&self, collection: Collection, query: &Query) -> PortResult<DocumentList> {
        let collections = lock(&self.collections);
        let mut matching: Vec<Document> = collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| query.filters.iter().all(|f| matches(f, &d.fields)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            // Stable sort, so equal keys keep insertion order.
            matching.sort_by(|a, b| {
                let ord = match (a.fields.get(&order.field), b.fields.get(&order.field)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let total = matching.len() as u64;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        let items = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .collect();
        Ok(DocumentList { items, total })
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> PortResult<Document> {
        let mut collections = lock(&self.collections);
        let document = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| PortError::NotFound(format!("{} {}", collection.as_str(), id)))?;
        document.fields.extend(fields);
        Ok(document.clone())
    }
}

//=========================================================================================
// Blobs
//=========================================================================================

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<(String, String), (BlobRef, Vec<u8>)>>,
}

impl InMemoryBlobStore {
    pub fn len(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, bucket: &str, id: &str) -> bool {
        lock(&self.blobs).contains_key(&(bucket.to_string(), id.to_string()))
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload_blob(&self, bucket: &str, id: &str, file: &UploadedFile) -> PortResult<BlobRef> {
        let mut blobs = lock(&self.blobs);
        let key = (bucket.to_string(), id.to_string());
        if blobs.contains_key(&key) {
            return Err(PortError::AlreadyExists(format!("blob {}", id)));
        }
        let blob = BlobRef {
            id: id.to_string(),
            bucket_id: bucket.to_string(),
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
        };
        blobs.insert(key, (blob.clone(), file.bytes.clone()));
        Ok(blob)
    }

    async fn download_blob(&self, bucket: &str, id: &str) -> PortResult<Vec<u8>> {
        lock(&self.blobs)
            .get(&(bucket.to_string(), id.to_string()))
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| PortError::NotFound(format!("blob {}", id)))
    }

    async fn delete_blob(&self, bucket: &str, id: &str) -> PortResult<()> {
        lock(&self.blobs)
            .remove(&(bucket.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("blob {}", id)))
    }
}

//=========================================================================================
// Counters, Reset Codes, Compensations
//=========================================================================================

#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, u64>>,
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str) -> PortResult<u64> {
        let mut counters = lock(&self.counters);
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[derive(Default)]
pub struct InMemoryResetCodeStore {
    requests: Mutex<Vec<ResetRequest>>,
}

#[async_trait]
impl ResetCodeStore for InMemoryResetCodeStore {
    async fn insert(&self, request: &ResetRequest) -> PortResult<()> {
        lock(&self.requests).push(request.clone());
        Ok(())
    }

    async fn find_latest(&self, email: &str, code: &str) -> PortResult<Option<ResetRequest>> {
        Ok(lock(&self.requests)
            .iter()
            .rev()
            .find(|r| r.user_email == email && r.code == code)
            .cloned())
    }

    async fn set_status(&self, id: Uuid, status: ResetCodeStatus) -> PortResult<()> {
        let mut requests = lock(&self.requests);
        let request = requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PortError::NotFound(format!("reset request {}", id)))?;
        request.status = status;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCompensationLog {
    entries: Mutex<Vec<(Compensation, bool)>>,
}

impl InMemoryCompensationLog {
    pub fn unresolved(&self) -> Vec<Compensation> {
        lock(&self.entries)
            .iter()
            .filter(|(_, resolved)| !resolved)
            .map(|(c, _)| c.clone())
            .collect()
    }
}

#[async_trait]
impl CompensationLog for InMemoryCompensationLog {
    async fn record(&self, compensation: &Compensation) -> PortResult<()> {
        lock(&self.entries).push((compensation.clone(), false));
        Ok(())
    }

    async fn pending(&self, max_attempts: u32) -> PortResult<Vec<Compensation>> {
        Ok(lock(&self.entries)
            .iter()
            .filter(|(c, resolved)| !resolved && c.attempts < max_attempts)
            .map(|(c, _)| c.clone())
            .collect())
    }

    async fn record_attempt(&self, id: Uuid, error: &str) -> PortResult<()> {
        let mut entries = lock(&self.entries);
        let (entry, _) = entries
            .iter_mut()
            .find(|(c, _)| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("compensation {}", id)))?;
        entry.attempts += 1;
        entry.last_error = error.to_string();
        Ok(())
    }

    async fn mark_resolved(&self, id: Uuid) -> PortResult<()> {
        let mut entries = lock(&self.entries);
        let (_, resolved) = entries
            .iter_mut()
            .find(|(c, _)| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("compensation {}", id)))?;
        *resolved = true;
        Ok(())
    }
}

//=========================================================================================
// Notifications
//=========================================================================================

/// Keeps every email it is asked to send. Can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Email>>,
    attempted: Mutex<Vec<Email>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn sent(&self) -> Vec<Email> {
        lock(&self.sent).clone()
    }

    /// Every email handed over, including the ones that failed to send.
    pub fn attempted(&self) -> Vec<Email> {
        lock(&self.attempted).clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send_email(&self, email: &Email) -> PortResult<String> {
        lock(&self.attempted).push(email.clone());
        if *lock(&self.failing) {
            return Err(PortError::Unexpected("mail provider unavailable".to_string()));
        }
        let mut sent = lock(&self.sent);
        sent.push(email.clone());
        Ok(format!("recorded-{}", sent.len()))
    }
}
