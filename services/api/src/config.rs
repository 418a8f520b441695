//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use procurement_core::WorkflowSettings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where documents, counters, reset codes and compensations live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    /// Process-local stores. Counters survive restarts only with `COUNTER_FILE`.
    Memory,
}

/// Credentials for the Postmark email API.
#[derive(Clone, Debug)]
pub struct PostmarkConfig {
    pub api_token: String,
    pub base_url: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub store: StoreBackend,
    pub counter_file: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    /// `None` logs emails instead of sending them.
    pub postmark: Option<PostmarkConfig>,
    pub email_from: String,
    pub email_reply_to: Option<String>,
    pub document_bucket: String,
    pub reset_code_ttl_minutes: i64,
    pub staff_email_domain: String,
    pub compensation_retry: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of a variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Server and Logging ---
        let bind_address = parse(&var, "BIND_ADDRESS", "0.0.0.0:3000")?;
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage ---
        let store = match var("STORE_BACKEND").as_deref().unwrap_or("postgres") {
            "postgres" => StoreBackend::Postgres {
                database_url: var("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
                max_connections: parse(&var, "DATABASE_MAX_CONNECTIONS", "5")?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };
        let counter_file = var("COUNTER_FILE").map(PathBuf::from);

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        // --- Email ---
        let postmark = var("POSTMARK_API_TOKEN").map(|api_token| PostmarkConfig {
            api_token,
            base_url: var("POSTMARK_BASE_URL")
                .unwrap_or_else(|| "https://api.postmarkapp.com".to_string()),
        });
        let email_from = var("EMAIL_FROM").unwrap_or_else(|| "no-reply@nrep.ug".to_string());
        let email_reply_to = var("EMAIL_REPLY_TO");

        // --- Workflow ---
        let document_bucket =
            var("DOCUMENT_BUCKET").unwrap_or_else(|| "procurement-documents".to_string());
        let reset_code_ttl_minutes = parse(&var, "RESET_CODE_TTL_MINUTES", "30")?;
        let staff_email_domain = var("STAFF_EMAIL_DOMAIN").unwrap_or_else(|| "nrep.ug".to_string());
        let compensation_retry =
            Duration::from_secs(parse(&var, "COMPENSATION_RETRY_SECS", "60")?);
        let max_upload_bytes = parse(&var, "MAX_UPLOAD_BYTES", "10485760")?;

        Ok(Self {
            bind_address,
            log_level,
            store,
            counter_file,
            allowed_origins,
            postmark,
            email_from,
            email_reply_to,
            document_bucket,
            reset_code_ttl_minutes,
            staff_email_domain,
            compensation_retry,
            max_upload_bytes,
        })
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            document_bucket: self.document_bucket.clone(),
            staff_email_domain: self.staff_email_domain.clone(),
            reset_code_ttl: chrono::Duration::minutes(self.reset_code_ttl_minutes),
            ..WorkflowSettings::default()
        }
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use testresult::TestResult;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn memory_backend_needs_no_database() -> TestResult {
        let config = load(&[("STORE_BACKEND", "memory")])?;

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.email_from, "no-reply@nrep.ug");
        assert_eq!(config.reset_code_ttl_minutes, 30);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.postmark.is_none());
        Ok(())
    }

    #[test]
    fn postgres_backend_requires_a_url() {
        let result = load(&[]);
        assert!(matches!(result, Err(ConfigError::MissingVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn values_are_parsed_and_validated() -> TestResult {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/nrep"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("ALLOWED_ORIGINS", "https://a.nrep.ug, https://b.nrep.ug"),
            ("POSTMARK_API_TOKEN", "token"),
            ("COMPENSATION_RETRY_SECS", "5"),
        ])?;

        assert_eq!(
            config.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/nrep".into(),
                max_connections: 12,
            }
        );
        assert_eq!(config.allowed_origins, ["https://a.nrep.ug", "https://b.nrep.ug"]);
        assert_eq!(
            config.postmark.map(|p| p.base_url).as_deref(),
            Some("https://api.postmarkapp.com")
        );
        assert_eq!(config.compensation_retry, Duration::from_secs(5));

        let bad = load(&[("STORE_BACKEND", "memory"), ("MAX_UPLOAD_BYTES", "lots")]);
        assert!(matches!(bad, Err(ConfigError::InvalidValue(v, _)) if v == "MAX_UPLOAD_BYTES"));
        Ok(())
    }
}
