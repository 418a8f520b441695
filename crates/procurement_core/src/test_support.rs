//! Shared fixtures for the workflow tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::clock::ManualClock;
use crate::domain::{NewPost, NewSupplier, UploadedFile};
use crate::memory::{
    InMemoryBlobStore, InMemoryCompensationLog, InMemoryCounterStore, InMemoryDocumentStore,
    InMemoryResetCodeStore, RecordingNotifier,
};
use crate::ports::{
    BlobStore, Clock, Collection, CompensationLog, DocumentStore, PasswordHasher, PortResult,
};
use crate::workflow::{Ports, ProcurementWorkflow, WorkflowSettings};

/// Reversible stand-in for a real password hash.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash_password(&self, plain: &str) -> PortResult<String> {
        Ok(format!("hashed:{plain}"))
    }

    fn verify_password(&self, plain: &str, hash: &str) -> PortResult<bool> {
        Ok(hash == format!("hashed:{plain}"))
    }
}

/// A workflow over in-memory ports, with handles to inspect them.
///
/// Overridden ports replace the in-memory ones inside the workflow; the handles
/// then point at unused stores.
pub struct Harness {
    pub workflow: ProcurementWorkflow,
    pub documents: Arc<InMemoryDocumentStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

#[derive(Default)]
pub struct HarnessBuilder {
    documents: Option<Arc<dyn DocumentStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    compensations: Option<Arc<dyn CompensationLog>>,
    notifier: Option<Arc<RecordingNotifier>>,
}

impl HarnessBuilder {
    pub fn documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn compensations(mut self, compensations: Arc<dyn CompensationLog>) -> Self {
        self.compensations = Some(compensations);
        self
    }

    pub fn notifier(mut self, notifier: Arc<RecordingNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Harness {
        let documents = Arc::new(InMemoryDocumentStore::procurement());
        let blobs = Arc::new(InMemoryBlobStore::default());
        let notifier = self.notifier.unwrap_or_default();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 0).unwrap(),
        ));

        let default_documents: Arc<dyn DocumentStore> = documents.clone();
        let default_blobs: Arc<dyn BlobStore> = blobs.clone();
        let default_compensations: Arc<dyn CompensationLog> = Arc::new(InMemoryCompensationLog::default());

        let ports = Ports {
            documents: self.documents.unwrap_or(default_documents),
            blobs: self.blobs.unwrap_or(default_blobs),
            counters: Arc::new(InMemoryCounterStore::default()),
            reset_codes: Arc::new(InMemoryResetCodeStore::default()),
            compensations: self.compensations.unwrap_or(default_compensations),
            notifier: notifier.clone(),
            hasher: Arc::new(PlainHasher),
            clock: clock.clone(),
        };

        Harness {
            workflow: ProcurementWorkflow::new(ports, WorkflowSettings::default()),
            documents,
            blobs,
            notifier,
            clock,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn with_documents(documents: Arc<dyn DocumentStore>) -> Self {
        Self::builder().documents(documents).build()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

pub fn supplier_form(email: &str, password: &str) -> NewSupplier {
    NewSupplier {
        company_name: "Acme Solar Ltd".into(),
        contact_person: "Grace Auma".into(),
        account_email: email.into(),
        password: password.into(),
        company_email: Some("info@acme-solar.co.ug".into()),
        phone: "+256700000000".into(),
        address: "Plot 12, Kampala Road".into(),
        country: "Uganda".into(),
        city: "Kampala".into(),
        website: None,
        products_services: vec!["Solar installation".into()],
    }
}

pub fn pdf(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        mime_type: "application/pdf".to_string(),
        bytes: format!("%PDF-1.4 {name}").into_bytes(),
    }
}

/// A post issued at `issued` whose submissions close `open_for` later.
pub fn new_post(issued: DateTime<Utc>, open_for: Duration) -> NewPost {
    NewPost {
        title: "Supply of solar panels".into(),
        introduction: None,
        description: "Supply and installation of solar panels for district offices".into(),
        category: "Goods".into(),
        deliverables: vec!["Installed panels".into()],
        submission_requirements: vec!["Incorporation certificate".into()],
        evaluation_criteria: vec!["Price".into()],
        terms_and_conditions: vec![],
        issuance_date: issued,
        submission_deadline: issued + open_for,
        questions_deadline: None,
        contract_award_date: None,
        created_by: Some("STF-001".into()),
        status: None,
    }
}

/// Adds an HR staff record whose password hashes with [`PlainHasher`].
pub fn seed_staff(h: &Harness, staff_id: &str, work_email: &str, personal_email: &str, password: &str) {
    let fields = json!({
        "staffID": staff_id,
        "workEmail": work_email,
        "email1": personal_email,
        "password": format!("hashed:{password}"),
        "firstName": "Jane",
        "surName": "Doe",
    });
    if let serde_json::Value::Object(fields) = fields {
        h.documents.seed(Collection::HrStaff, staff_id, fields);
    }
}
