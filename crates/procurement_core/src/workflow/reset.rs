//! crates/procurement_core/src/workflow/reset.rs
//!
//! The three-step password reset protocol: request a code, confirm it, then change
//! the password with it.

use serde_json::Value;
use tracing::{info, warn};

use super::error::{ensure_valid, WorkflowError, WorkflowResult};
use super::validation::{check_password, require};
use super::ProcurementWorkflow;
use crate::domain::{format_timestamp, Email};
use crate::ports::{Collection, Fields};

/// Result of a reset request. The code is persisted even when the email failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRequestOutcome {
    pub email_sent: bool,
}

impl ProcurementWorkflow {
    pub async fn request_reset(&self, email: &str) -> WorkflowResult<ResetRequestOutcome> {
        let mut errors = Vec::new();
        require(&mut errors, "email", email);
        ensure_valid(errors)?;

        if self.find_supplier_by_email(email).await?.is_none() {
            return Err(WorkflowError::UnknownEmail);
        }

        let code = self.credentials.issue_reset_code(email).await?;
        let message = self.reset_email(email, &code);
        let email_sent = match self.notifier.send_email(&message).await {
            Ok(message_id) => {
                info!(email = %email, message_id = %message_id, "Sent password reset code");
                true
            }
            Err(e) => {
                warn!(email = %email, error = %e, "Failed to send password reset email; code stays valid");
                false
            }
        };
        Ok(ResetRequestOutcome { email_sent })
    }

    /// Accepts a code once. Does not touch the password.
    pub async fn confirm_code(&self, email: &str, code: &str) -> WorkflowResult<()> {
        let mut errors = Vec::new();
        require(&mut errors, "email", email);
        require(&mut errors, "code", code);
        ensure_valid(errors)?;

        if self.credentials.verify_reset_code(email, code).await? {
            Ok(())
        } else {
            Err(WorkflowError::ExpiredOrInvalidCode)
        }
    }

    pub async fn change_password(&self, email: &str, code: &str, new_password: &str) -> WorkflowResult<()> {
        let mut errors = Vec::new();
        require(&mut errors, "email", email);
        require(&mut errors, "code", code);
        check_password(&mut errors, "newPassword", new_password);
        ensure_valid(errors)?;

        if !self.credentials.confirm_still_valid(email, code).await? {
            return Err(WorkflowError::ExpiredOrInvalidCode);
        }

        let supplier = self
            .find_supplier_by_email(email)
            .await?
            .ok_or(WorkflowError::UnknownEmail)?;
        let password_hash = self.credentials.hash_password(new_password)?;

        let mut fields = Fields::new();
        fields.insert("passwordHash".into(), Value::String(password_hash));
        fields.insert("updatedAt".into(), Value::String(format_timestamp(&self.clock.now())));
        self.documents
            .update_document(Collection::Suppliers, &supplier.supplier_id, fields)
            .await?;
        self.credentials.consume(email, code).await?;

        info!(supplier_id = %supplier.supplier_id, "Password changed with reset code");
        Ok(())
    }

    fn reset_email(&self, email: &str, code: &str) -> Email {
        let minutes = self.credentials.ttl().num_minutes();
        let html = format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: auto;\">\
             <h2>Password Reset Request</h2>\
             <p>We received a request to reset the password of your NREP procurement account.</p>\
             <p>Your password reset code is:</p>\
             <p style=\"font-size: 24px; font-weight: bold; letter-spacing: 4px;\">{code}</p>\
             <p>This code will expire in {minutes} minutes. If you did not request a password \
             reset, you can ignore this email.</p>\
             </div>"
        );
        let text = format!(
            "Your password reset code is {code}. This code will expire in {minutes} minutes."
        );
        Email {
            to: vec![email.to_string()],
            subject: "Password Reset Code".to_string(),
            html: Some(html),
            text: Some(text),
            department: Some(self.settings.department.clone()),
            ..Email::default()
        }
    }
}
