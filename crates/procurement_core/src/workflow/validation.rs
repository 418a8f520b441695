//! crates/procurement_core/src/workflow/validation.rs
//!
//! Input checks run before any side effect.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{NewCategory, NewPost, NewSupplier};
use crate::workflow::error::FieldError;

pub const POST_STATUSES: [&str; 3] = ["active", "pending", "closed"];
pub const APPLICATION_STATUSES: [&str; 4] = ["pending", "approved", "rejected", "shortlisted"];
pub const MIN_PASSWORD_LENGTH: usize = 8;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .unwrap_or_else(|e| unreachable!("static email pattern: {e}"))
    })
}

pub fn is_email(value: &str) -> bool {
    email_regex().is_match(value)
}

/// True for addresses at `domain` or any of its subdomains.
pub fn is_organization_email(email: &str, domain: &str) -> bool {
    if !is_email(email) {
        return false;
    }
    let Some((_, host)) = email.rsplit_once('@') else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

pub fn require(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, format!("{field} is required")));
    }
}

pub fn check_password(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(FieldError::new(
            field,
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long"),
        ));
    }
}

pub fn check_email(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if !is_email(value) {
        errors.push(FieldError::new(field, "Invalid email"));
    }
}

pub fn validate_new_supplier(form: &NewSupplier) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require(&mut errors, "companyName", &form.company_name);
    require(&mut errors, "contactPerson", &form.contact_person);
    check_email(&mut errors, "accountEmail", &form.account_email);
    check_password(&mut errors, "password", &form.password);
    require(&mut errors, "phone", &form.phone);
    require(&mut errors, "address", &form.address);
    require(&mut errors, "country", &form.country);
    require(&mut errors, "city", &form.city);
    if let Some(email) = form.company_email.as_deref().filter(|e| !e.is_empty()) {
        check_email(&mut errors, "companyEmail", email);
    }
    if form.products_services.iter().all(|p| p.trim().is_empty()) {
        errors.push(FieldError::new(
            "productsServices",
            "Products/Services must be at least one Service/Product offered",
        ));
    }
    errors
}

pub fn validate_new_post(form: &NewPost) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require(&mut errors, "title", &form.title);
    require(&mut errors, "description", &form.description);
    require(&mut errors, "category", &form.category);
    if form.submission_deadline <= form.issuance_date {
        errors.push(FieldError::new(
            "submissionDeadline",
            "Submission deadline must be after the issuance date",
        ));
    }
    if let Some(status) = &form.status {
        check_one_of(&mut errors, "status", status, &POST_STATUSES);
    }
    errors
}

pub fn validate_new_category(form: &NewCategory) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require(&mut errors, "name", &form.name);
    errors
}

pub fn check_one_of(errors: &mut Vec<FieldError>, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errors.push(FieldError::new(
            field,
            format!("Invalid {field} value: {value} (expected one of {})", allowed.join(", ")),
        ));
    }
}

pub fn check_page(errors: &mut Vec<FieldError>, page: u32) {
    if page == 0 {
        errors.push(FieldError::new("page", "page must be 1 or greater"));
    }
}
