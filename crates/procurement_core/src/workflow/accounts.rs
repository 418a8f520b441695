//! crates/procurement_core/src/workflow/accounts.rs
//!
//! Supplier and staff sign-up and sign-in.

use tracing::{error, info, warn};

use super::error::{ensure_valid, FieldError, WorkflowError, WorkflowResult};
use super::validation::{is_organization_email, require, validate_new_supplier};
use super::{exactly_one, ProcurementWorkflow};
use crate::domain::{
    IdKind, NewStaffAccount, NewSupplier, ProcurementStaffAccount, StaffIdentity, StaffRecord,
    Supplier, SupplierView, UploadedFile, UserType,
};
use crate::ports::{encode, Collection, Filter, PortError, Query};

const NO_SUPPLIER_ACCOUNT: &str = "No account found. Check your email or password and try again.";
const NO_STAFF_ACCOUNT: &str = "No staff account found. Check your email or password and try again.";
const NO_PROCUREMENT_STAFF_ACCOUNT: &str =
    "No account found in the Procurement Portal for Staff. Check your email or password and try again.";

impl ProcurementWorkflow {
    /// Registers a supplier, optionally with one supporting document.
    ///
    /// The document is uploaded before the record is written; if the write fails the
    /// upload is discarded again.
    pub async fn sign_up_supplier(
        &self,
        form: NewSupplier,
        file: Option<UploadedFile>,
    ) -> WorkflowResult<SupplierView> {
        ensure_valid(validate_new_supplier(&form))?;

        let supplier_id = self
            .ids
            .next_id(IdKind::SupplierRegistration)
            .await
            .map_err(WorkflowError::AccountCreationFailed)?;
        let password_hash = self
            .credentials
            .hash_password(&form.password)
            .map_err(WorkflowError::AccountCreationFailed)?;

        let documents = match &file {
            Some(file) => vec![self.upload(file).await?],
            None => Vec::new(),
        };

        let now = self.clock.now();
        let supplier = Supplier {
            supplier_id: supplier_id.clone(),
            account_email: form.account_email,
            password_hash,
            company_name: form.company_name,
            contact_person: form.contact_person,
            company_email: form.company_email.filter(|e| !e.is_empty()),
            phone: form.phone,
            address: form.address,
            country: form.country,
            city: form.city,
            website: form.website.filter(|w| !w.is_empty()),
            products_services: form.products_services,
            validated: false,
            user_type: vec![UserType::Supplier],
            documents,
            created_at: now,
            updated_at: now,
        };

        let fields = match encode(&supplier) {
            Ok(fields) => fields,
            Err(e) => {
                self.discard_blobs(&supplier.documents).await;
                return Err(WorkflowError::AccountCreationFailed(e));
            }
        };

        match self
            .documents
            .create_document(Collection::Suppliers, &supplier_id, fields)
            .await
        {
            Ok(_) => {
                info!(supplier_id = %supplier_id, "Supplier registered");
                Ok(supplier.into())
            }
            Err(PortError::AlreadyExists(detail)) => {
                warn!(supplier_id = %supplier_id, detail = %detail, "Supplier registration rejected as duplicate");
                self.discard_blobs(&supplier.documents).await;
                Err(WorkflowError::DuplicateAccount)
            }
            Err(e) => {
                error!(supplier_id = %supplier_id, error = %e, "Failed to create supplier");
                self.discard_blobs(&supplier.documents).await;
                Err(WorkflowError::AccountCreationFailed(e))
            }
        }
    }

    pub async fn sign_in_supplier(&self, email: &str, password: &str) -> WorkflowResult<SupplierView> {
        check_credentials_present(email, password)?;

        let supplier = self
            .find_supplier_by_email(email)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(NO_SUPPLIER_ACCOUNT.to_string()))?;

        if !self.credentials.verify_password(password, &supplier.password_hash)? {
            info!(supplier_id = %supplier.supplier_id, "Supplier sign-in rejected");
            return Err(WorkflowError::InvalidCredentials);
        }

        info!(supplier_id = %supplier.supplier_id, "Supplier signed in");
        Ok(supplier.into())
    }

    /// Signs in a staff member with their HR credentials.
    ///
    /// The staff member must exist in HR and must also have been provisioned in the
    /// procurement domain.
    pub async fn sign_in_staff(&self, email: &str, password: &str) -> WorkflowResult<StaffIdentity> {
        check_credentials_present(email, password)?;

        let email_field = if is_organization_email(email, &self.settings.staff_email_domain) {
            "workEmail"
        } else {
            "email1"
        };
        let hr_matches = self
            .documents
            .list_documents(
                Collection::HrStaff,
                &Query::new().filter(Filter::equal(email_field, email)),
            )
            .await?;
        let staff: StaffRecord = exactly_one(hr_matches)
            .ok_or_else(|| WorkflowError::NotFound(NO_STAFF_ACCOUNT.to_string()))?
            .decode()?;

        let account: ProcurementStaffAccount = self
            .find_procurement_staff(&staff.staff_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(NO_PROCUREMENT_STAFF_ACCOUNT.to_string()))?;

        if !self.credentials.verify_password(password, &staff.password_hash)? {
            info!(staff_id = %staff.staff_id, "Staff sign-in rejected");
            return Err(WorkflowError::InvalidCredentials);
        }

        info!(staff_id = %staff.staff_id, "Staff signed in");
        Ok(StaffIdentity {
            account,
            first_name: staff.first_name,
            middle_name: staff.middle_name,
            sur_name: staff.sur_name,
        })
    }

    /// Mirrors an HR staff member into the procurement domain.
    pub async fn sign_up_staff(&self, form: NewStaffAccount) -> WorkflowResult<ProcurementStaffAccount> {
        let mut errors = Vec::new();
        require(&mut errors, "staffID", &form.staff_id);
        require(&mut errors, "role", &form.role);
        ensure_valid(errors)?;

        let hr_matches = self
            .documents
            .list_documents(
                Collection::HrStaff,
                &Query::new().filter(Filter::equal("staffID", form.staff_id.as_str())),
            )
            .await?;
        if exactly_one(hr_matches).is_none() {
            return Err(WorkflowError::NotFound(format!(
                "No HR record found for staff {}",
                form.staff_id
            )));
        }

        let now = self.clock.now();
        let user_type = if form.user_type.is_empty() {
            vec!["staff".to_string()]
        } else {
            form.user_type
        };
        let account = ProcurementStaffAccount {
            staff_id: form.staff_id,
            role: form.role,
            user_type,
            created_at: now,
            updated_at: now,
        };

        match self
            .documents
            .create_document(Collection::ProcurementStaff, &account.staff_id, encode(&account)?)
            .await
        {
            Ok(_) => {
                info!(staff_id = %account.staff_id, "Staff account provisioned for procurement");
                Ok(account)
            }
            Err(PortError::AlreadyExists(_)) => Err(WorkflowError::DuplicateAccount),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_supplier(&self, supplier_id: &str) -> WorkflowResult<SupplierView> {
        let supplier: Supplier = self
            .documents
            .get_document(Collection::Suppliers, supplier_id)
            .await
            .map_err(|e| not_found_as(e, "Supplier not found"))?
            .decode()?;
        Ok(supplier.into())
    }

    /// The supplier registered under `email`, if exactly one is.
    pub(super) async fn find_supplier_by_email(&self, email: &str) -> WorkflowResult<Option<Supplier>> {
        let matches = self
            .documents
            .list_documents(
                Collection::Suppliers,
                &Query::new().filter(Filter::equal("accountEmail", email)),
            )
            .await?;
        if matches.total > 1 {
            warn!(count = matches.total, "Several supplier accounts share one email");
        }
        exactly_one(matches).map(|doc| doc.decode()).transpose().map_err(Into::into)
    }

    async fn find_procurement_staff(&self, staff_id: &str) -> WorkflowResult<Option<ProcurementStaffAccount>> {
        let matches = self
            .documents
            .list_documents(
                Collection::ProcurementStaff,
                &Query::new().filter(Filter::equal("staffID", staff_id)),
            )
            .await?;
        exactly_one(matches).map(|doc| doc.decode()).transpose().map_err(Into::into)
    }
}

fn check_credentials_present(email: &str, password: &str) -> WorkflowResult<()> {
    let mut errors: Vec<FieldError> = Vec::new();
    require(&mut errors, "email", email);
    require(&mut errors, "password", password);
    ensure_valid(errors)
}

/// Maps a port `NotFound` to a user-facing message; other errors stay upstream failures.
pub(super) fn not_found_as(error: PortError, message: &str) -> WorkflowError {
    match error {
        PortError::NotFound(_) => WorkflowError::NotFound(message.to_string()),
        other => WorkflowError::Upstream(other),
    }
}
