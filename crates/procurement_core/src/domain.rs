//! crates/procurement_core/src/domain.rs
//!
//! Defines the core data structures of the procurement workflow.
//! Documents are persisted as JSON objects, so every entity carries the serde
//! attributes that fix its field names in the document store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Timestamps
//=========================================================================================

/// Formats a timestamp the way it is stored in documents.
///
/// The format is fixed width (millisecond precision, `Z` suffix) so that the
/// lexicographic order of stored strings matches chronological order, which the
/// deadline filters rely on.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Serde adapter for `DateTime<Utc>` fields stored with [`format_timestamp`].
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same as the parent module, for optional fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&super::super::format_timestamp(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}

//=========================================================================================
// Identifiers
//=========================================================================================

/// The kinds of human-readable reference numbers handed out by the identifier generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// `PR` (`PRA`): a supplier's application against a post.
    ProcurementRequest,
    /// `PS` (`PRF`): a published procurement post.
    ProcurementPost,
    /// `SR` (`SPL`): a supplier registration.
    SupplierRegistration,
    /// `CAT`: a procurement category.
    Category,
}

impl IdKind {
    pub const ALL: [IdKind; 4] = [
        IdKind::ProcurementRequest,
        IdKind::ProcurementPost,
        IdKind::SupplierRegistration,
        IdKind::Category,
    ];

    /// The three letter code embedded in generated identifiers.
    pub fn prefix(self) -> &'static str {
        match self {
            IdKind::ProcurementRequest => "PRA",
            IdKind::ProcurementPost => "PRF",
            IdKind::SupplierRegistration => "SPL",
            IdKind::Category => "CAT",
        }
    }

    /// The key under which the kind's sequence counter is persisted.
    pub fn counter_key(self) -> &'static str {
        match self {
            IdKind::ProcurementRequest => "procurementRequestCounter",
            IdKind::ProcurementPost => "procurementPostCounter",
            IdKind::SupplierRegistration => "supplierRegistrationCounter",
            IdKind::Category => "procurementCategoryCounter",
        }
    }
}

//=========================================================================================
// Blobs
//=========================================================================================

/// Opaque handle to a file held by the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    pub id: String,
    pub bucket_id: String,
    pub file_name: String,
    pub mime_type: String,
}

/// A file received from a client, not yet stored.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Supplier,
    Staff,
}

/// A registered supplier, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    #[serde(rename = "supplierID")]
    pub supplier_id: String,
    pub account_email: String,
    pub password_hash: String,
    pub company_name: String,
    pub contact_person: String,
    #[serde(default)]
    pub company_email: Option<String>,
    pub phone: String,
    pub address: String,
    pub country: String,
    pub city: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub products_services: Vec<String>,
    #[serde(default)]
    pub validated: bool,
    pub user_type: Vec<UserType>,
    #[serde(default)]
    pub documents: Vec<BlobRef>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// A supplier as returned to clients: everything except the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierView {
    #[serde(rename = "supplierID")]
    pub supplier_id: String,
    pub account_email: String,
    pub company_name: String,
    pub contact_person: String,
    pub company_email: Option<String>,
    pub phone: String,
    pub address: String,
    pub country: String,
    pub city: String,
    pub website: Option<String>,
    pub products_services: Vec<String>,
    pub validated: bool,
    pub user_type: Vec<UserType>,
    pub documents: Vec<BlobRef>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl From<Supplier> for SupplierView {
    fn from(s: Supplier) -> Self {
        Self {
            supplier_id: s.supplier_id,
            account_email: s.account_email,
            company_name: s.company_name,
            contact_person: s.contact_person,
            company_email: s.company_email,
            phone: s.phone,
            address: s.address,
            country: s.country,
            city: s.city,
            website: s.website,
            products_services: s.products_services,
            validated: s.validated,
            user_type: s.user_type,
            documents: s.documents,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// A supplier row in the paginated admin listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierSummary {
    #[serde(flatten)]
    pub supplier: SupplierView,
    pub application_count: u64,
}

/// Registration form for a new supplier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplier {
    pub company_name: String,
    pub contact_person: String,
    pub account_email: String,
    pub password: String,
    #[serde(default)]
    pub company_email: Option<String>,
    pub phone: String,
    pub address: String,
    pub country: String,
    pub city: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub products_services: Vec<String>,
}

/// An HR staff record. Owned by the HR module; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRecord {
    #[serde(rename = "staffID")]
    pub staff_id: String,
    #[serde(default)]
    pub work_email: Option<String>,
    #[serde(default)]
    pub email1: Option<String>,
    #[serde(rename = "password")]
    pub password_hash: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub sur_name: String,
}

/// Mirror of an HR staff member inside the procurement domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementStaffAccount {
    #[serde(rename = "staffID")]
    pub staff_id: String,
    pub role: String,
    pub user_type: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStaffAccount {
    #[serde(rename = "staffID")]
    pub staff_id: String,
    pub role: String,
    #[serde(default)]
    pub user_type: Vec<String>,
}

/// The identity returned by a successful staff sign-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffIdentity {
    #[serde(flatten)]
    pub account: ProcurementStaffAccount,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub sur_name: String,
}

//=========================================================================================
// Posts, Applications and Categories
//=========================================================================================

/// A published procurement opportunity (a "service").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementPost {
    #[serde(rename = "procureID")]
    pub procure_id: String,
    pub title: String,
    #[serde(default)]
    pub introduction: Option<String>,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub submission_requirements: Vec<String>,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
    #[serde(default)]
    pub terms_and_conditions: Vec<String>,
    #[serde(with = "timestamp")]
    pub issuance_date: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub submission_deadline: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub questions_deadline: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub contract_award_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub status: String,
    #[serde(default)]
    pub other_documents: Vec<BlobRef>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub introduction: Option<String>,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub submission_requirements: Vec<String>,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
    #[serde(default)]
    pub terms_and_conditions: Vec<String>,
    pub issuance_date: DateTime<Utc>,
    pub submission_deadline: DateTime<Utc>,
    #[serde(default)]
    pub questions_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contract_award_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Query options for the unpaginated post listing.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub all: bool,
    pub expired: bool,
    pub status: Option<String>,
}

/// A supplier's submission against one post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "applicationID")]
    pub application_id: String,
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "supplierID")]
    pub supplier_id: String,
    pub submitted_documents: Vec<BlobRef>,
    pub status: String,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApplication {
    #[serde(rename = "supplierID")]
    pub supplier_id: String,
    #[serde(rename = "procurementID")]
    pub procurement_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub comments: Option<String>,
}

/// The fixed, ordered list of documents an application may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentSlot {
    IncorporationCertificate,
    TeamCv,
    TeamCv2,
    Budget,
    OtherDocument,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 5] = [
        DocumentSlot::IncorporationCertificate,
        DocumentSlot::TeamCv,
        DocumentSlot::TeamCv2,
        DocumentSlot::Budget,
        DocumentSlot::OtherDocument,
    ];

    /// The multipart field name the slot is submitted under.
    pub fn field_name(self) -> &'static str {
        match self {
            DocumentSlot::IncorporationCertificate => "incorporationCertificate",
            DocumentSlot::TeamCv => "teamCv",
            DocumentSlot::TeamCv2 => "teamCv2",
            DocumentSlot::Budget => "budget",
            DocumentSlot::OtherDocument => "otherDocument",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.field_name() == name)
    }

    pub fn is_required(self) -> bool {
        matches!(self, DocumentSlot::IncorporationCertificate | DocumentSlot::TeamCv)
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "catID")]
    pub cat_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub classification: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub classification: Vec<String>,
}

//=========================================================================================
// Password Reset
//=========================================================================================

/// Lifecycle of a password reset code.
///
/// `Issued -> Verified -> Consumed`, with `Expired` reachable from `Issued` or
/// `Verified` once the validity window has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetCodeStatus {
    Issued,
    Verified,
    Consumed,
    Expired,
}

impl ResetCodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResetCodeStatus::Issued => "issued",
            ResetCodeStatus::Verified => "verified",
            ResetCodeStatus::Consumed => "consumed",
            ResetCodeStatus::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "issued" => Some(ResetCodeStatus::Issued),
            "verified" => Some(ResetCodeStatus::Verified),
            "consumed" => Some(ResetCodeStatus::Consumed),
            "expired" => Some(ResetCodeStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    pub id: Uuid,
    pub user_email: String,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub status: ResetCodeStatus,
}

//=========================================================================================
// Notifications and Compensations
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A transactional email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    /// Shown in the sender's display name, e.g. "Procurement Department - ...".
    pub department: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

/// A blob delete that failed and still has to be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compensation {
    pub id: Uuid,
    pub bucket_id: String,
    pub blob_id: String,
    pub attempts: u32,
    pub last_error: String,
    pub recorded_at: DateTime<Utc>,
}

//=========================================================================================
// Pagination
//=========================================================================================

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    #[serde(rename = "documents")]
    pub items: Vec<T>,
    #[serde(rename = "currentPage")]
    pub page: u32,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "totalDocuments")]
    pub total: u64,
}
