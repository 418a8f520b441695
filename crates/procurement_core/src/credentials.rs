//! crates/procurement_core/src/credentials.rs
//!
//! Password hashing and the password reset code lifecycle.
//!
//! A reset code goes through two checks. `verify_reset_code` consumes a freshly
//! issued code (`Issued -> Verified`) so the client can show a "code accepted" step,
//! and `confirm_still_valid` is called right before the password is actually changed.
//! Both checks are bounded by the same window measured from issuance.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ResetCodeStatus, ResetRequest};
use crate::ids::random_alphanumeric_code;
use crate::ports::{Clock, PasswordHasher, PortResult, ResetCodeStore};

pub const RESET_CODE_LENGTH: usize = 6;

/// The default validity window of a reset code.
pub fn default_reset_code_ttl() -> Duration {
    Duration::minutes(30)
}

impl ResetCodeStatus {
    /// Phase one. Returns the next status and whether the code was accepted.
    pub fn on_verify(self, expired: bool) -> (ResetCodeStatus, bool) {
        match (self, expired) {
            (ResetCodeStatus::Issued, false) => (ResetCodeStatus::Verified, true),
            (ResetCodeStatus::Issued, true) => (ResetCodeStatus::Expired, false),
            (status, _) => (status, false),
        }
    }

    /// Phase two: only a verified code still inside its window may change a password.
    pub fn permits_change(self, expired: bool) -> bool {
        self == ResetCodeStatus::Verified && !expired
    }
}

#[derive(Clone)]
pub struct CredentialService {
    hasher: Arc<dyn PasswordHasher>,
    codes: Arc<dyn ResetCodeStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl CredentialService {
    pub fn new(
        hasher: Arc<dyn PasswordHasher>,
        codes: Arc<dyn ResetCodeStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            hasher,
            codes,
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn hash_password(&self, plain: &str) -> PortResult<String> {
        self.hasher.hash_password(plain)
    }

    pub fn verify_password(&self, plain: &str, hash: &str) -> PortResult<bool> {
        self.hasher.verify_password(plain, hash)
    }

    /// Issues a new code for `email`. Earlier outstanding codes stay valid.
    pub async fn issue_reset_code(&self, email: &str) -> PortResult<String> {
        let code = random_alphanumeric_code(RESET_CODE_LENGTH);
        let request = ResetRequest {
            id: Uuid::new_v4(),
            user_email: email.to_string(),
            code: code.clone(),
            issued_at: self.clock.now(),
            status: ResetCodeStatus::Issued,
        };
        self.codes.insert(&request).await?;
        info!(email = %email, request_id = %request.id, "Issued password reset code");
        Ok(code)
    }

    /// Phase one: accepts and consumes an issued code.
    ///
    /// An expired code is moved to `Expired` as a side effect so it can never be used.
    pub async fn verify_reset_code(&self, email: &str, code: &str) -> PortResult<bool> {
        let Some(request) = self.codes.find_latest(email, code).await? else {
            debug!(email = %email, "No reset request matches the supplied code");
            return Ok(false);
        };

        let expired = self.is_expired(request.issued_at);
        let (next, accepted) = request.status.on_verify(expired);
        if next != request.status {
            self.codes.set_status(request.id, next).await?;
        }
        debug!(email = %email, from = request.status.as_str(), to = next.as_str(), accepted, "Reset code verification");
        Ok(accepted)
    }

    /// Phase two: the code must have passed phase one and still be inside its window.
    pub async fn confirm_still_valid(&self, email: &str, code: &str) -> PortResult<bool> {
        let Some(request) = self.codes.find_latest(email, code).await? else {
            return Ok(false);
        };
        let expired = self.is_expired(request.issued_at);
        if request.status == ResetCodeStatus::Verified && expired {
            self.codes.set_status(request.id, ResetCodeStatus::Expired).await?;
        }
        Ok(request.status.permits_change(expired))
    }

    /// Marks a verified code as used up once the password has been changed.
    pub async fn consume(&self, email: &str, code: &str) -> PortResult<()> {
        if let Some(request) = self.codes.find_latest(email, code).await? {
            self.codes.set_status(request.id, ResetCodeStatus::Consumed).await?;
        }
        Ok(())
    }

    fn is_expired(&self, issued_at: DateTime<Utc>) -> bool {
        self.clock.now() > issued_at + self.ttl
    }
}
