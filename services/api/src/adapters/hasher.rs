//! services/api/src/adapters/hasher.rs
//!
//! Argon2 implementation of the `PasswordHasher` port. Hashes are stored as PHC
//! strings, so the salt and parameters travel with the hash.

use argon2::{
    password_hash::{
        rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher as _,
        PasswordVerifier, SaltString,
    },
    Argon2,
};
use procurement_core::ports::{PasswordHasher, PortError, PortResult};
use tracing::error;

#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash_password(&self, plain: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })
    }

    fn verify_password(&self, plain: &str, hash: &str) -> PortResult<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            error!("Failed to parse password hash: {:?}", e);
            PortError::Unexpected("Stored password hash is malformed".to_string())
        })?;

        match self.argon2.verify_password(plain.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(e) => {
                error!("Failed to verify password: {:?}", e);
                Err(PortError::Unexpected("Failed to verify password".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn hashes_are_salted_and_verifiable() -> TestResult {
        let hasher = Argon2Hasher::new();

        let first = hasher.hash_password("password1234")?;
        let second = hasher.hash_password("password1234")?;

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2"));
        assert!(hasher.verify_password("password1234", &first)?);
        assert!(!hasher.verify_password("password9999", &first)?);
        Ok(())
    }

    #[test]
    fn malformed_hashes_are_errors() {
        let result = Argon2Hasher::new().verify_password("password1234", "not-a-hash");
        assert!(result.is_err());
    }
}
