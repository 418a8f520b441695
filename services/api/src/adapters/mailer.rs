//! services/api/src/adapters/mailer.rs
//!
//! Implementations of the `NotificationService` port: the Postmark email API, and a
//! logging fallback used when no Postmark token is configured.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use procurement_core::domain::Email;
use procurement_core::ports::{NotificationService, PortError, PortResult};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ORGANIZATION: &str = "National Renewable Energy Platform (NREP)";

/// Builds the `From` header, e.g. `Procurement Department - National Renewable ... <no-reply@nrep.ug>`.
fn sender(email: &Email, from_address: &str) -> String {
    match email.department.as_deref().filter(|d| !d.is_empty()) {
        Some(department) => format!("{department} Department - {ORGANIZATION} <{from_address}>"),
        None => format!("{ORGANIZATION} <{from_address}>"),
    }
}

//=========================================================================================
// Postmark
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkAttachment<'a> {
    name: &'a str,
    content: String,
    content_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkMessage<'a> {
    from: String,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<String>,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<PostmarkAttachment<'a>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkResponse {
    #[serde(rename = "MessageID")]
    message_id: Option<String>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
}

fn join(addresses: &[String]) -> Option<String> {
    let joined = addresses
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

/// Sends email through the Postmark `/email` endpoint.
#[derive(Clone)]
pub struct PostmarkMailer {
    client: reqwest::Client,
    base_url: String,
    from_address: String,
    reply_to: Option<String>,
}

impl PostmarkMailer {
    pub fn new(
        api_token: &str,
        base_url: String,
        from_address: String,
        reply_to: Option<String>,
    ) -> PortResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Postmark-Server-Token",
            HeaderValue::from_str(api_token)
                .map_err(|e| PortError::Unexpected(format!("invalid Postmark token header: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PortError::Unexpected(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            from_address,
            reply_to,
        })
    }
}

#[async_trait]
impl NotificationService for PostmarkMailer {
    async fn send_email(&self, email: &Email) -> PortResult<String> {
        let to = join(&email.to)
            .ok_or_else(|| PortError::Unexpected("email has no recipients".to_string()))?;
        let message = PostmarkMessage {
            from: sender(email, &self.from_address),
            to,
            cc: join(&email.cc),
            bcc: join(&email.bcc),
            subject: &email.subject,
            html_body: email.html.as_deref(),
            text_body: email.text.as_deref(),
            reply_to: email.reply_to.as_deref().or(self.reply_to.as_deref()),
            attachments: email
                .attachments
                .iter()
                .map(|a| PostmarkAttachment {
                    name: &a.name,
                    content: STANDARD.encode(&a.bytes),
                    content_type: &a.content_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/email", self.base_url))
            .json(&message)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Postmark request failed: {e}")))?;

        let status = response.status();
        let body: PostmarkResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("unreadable Postmark response ({status}): {e}")))?;

        if !status.is_success() || body.error_code != 0 {
            warn!(status = %status, error_code = body.error_code, message = %body.message, "Postmark rejected email");
            return Err(PortError::Unexpected(format!(
                "Postmark Error {}: {}",
                body.error_code, body.message
            )));
        }

        let message_id = body.message_id.unwrap_or_default();
        debug!(message_id = %message_id, subject = %email.subject, "Email accepted by Postmark");
        Ok(message_id)
    }
}

//=========================================================================================
// Logging fallback
//=========================================================================================

/// Writes emails to the log instead of sending them. For local development.
#[derive(Clone)]
pub struct LogMailer {
    from_address: String,
}

impl LogMailer {
    pub fn new(from_address: String) -> Self {
        Self { from_address }
    }
}

#[async_trait]
impl NotificationService for LogMailer {
    async fn send_email(&self, email: &Email) -> PortResult<String> {
        let message_id = Uuid::new_v4().to_string();
        info!(
            message_id = %message_id,
            from = %sender(email, &self.from_address),
            to = ?email.to,
            subject = %email.subject,
            body = email.text.as_deref().or(email.html.as_deref()).unwrap_or_default(),
            "Email not sent (no mail provider configured)"
        );
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procurement_core::domain::EmailAttachment;
    use serde_json::json;
    use testresult::TestResult;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reset_email() -> Email {
        Email {
            to: vec!["acme@co.com".into()],
            cc: vec!["".into()],
            subject: "Password Reset Code".into(),
            html: Some("<p>ABC123</p>".into()),
            department: Some("Procurement".into()),
            ..Email::default()
        }
    }

    fn mailer(server: &MockServer) -> TestResult<PostmarkMailer> {
        Ok(PostmarkMailer::new(
            "test-token",
            server.uri(),
            "no-reply@nrep.ug".into(),
            Some("procurement@nrep.ug".into()),
        )?)
    }

    #[tokio::test]
    async fn sends_with_token_and_sender_display_name() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .and(header("X-Postmark-Server-Token", "test-token"))
            .and(body_partial_json(json!({
                "From": "Procurement Department - National Renewable Energy Platform (NREP) <no-reply@nrep.ug>",
                "To": "acme@co.com",
                "Subject": "Password Reset Code",
                "ReplyTo": "procurement@nrep.ug",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "To": "acme@co.com",
                "MessageID": "b7bc2f4a-e38e-4336-af7d-e6c392c2f817",
                "ErrorCode": 0,
                "Message": "OK",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = mailer(&server)?.send_email(&reset_email()).await?;

        assert_eq!(id, "b7bc2f4a-e38e-4336-af7d-e6c392c2f817");
        Ok(())
    }

    #[tokio::test]
    async fn attachments_are_base64_encoded() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "Attachments": [{"Name": "award.pdf", "Content": "JVBERg==", "ContentType": "application/pdf"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MessageID": "m-1", "ErrorCode": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let mut email = reset_email();
        email.attachments.push(EmailAttachment {
            name: "award.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: b"%PDF".to_vec(),
        });

        mailer(&server)?.send_email(&email).await?;
        Ok(())
    }

    #[tokio::test]
    async fn provider_errors_become_port_errors() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "ErrorCode": 400,
                "Message": "Sender signature not defined",
            })))
            .mount(&server)
            .await;

        let result = mailer(&server)?.send_email(&reset_email()).await;

        assert!(matches!(result, Err(PortError::Unexpected(m)) if m.contains("Sender signature")));
        Ok(())
    }

    #[tokio::test]
    async fn emails_without_recipients_are_refused() -> TestResult {
        let server = MockServer::start().await;
        let email = Email {
            subject: "nobody".into(),
            ..Email::default()
        };

        let result = mailer(&server)?.send_email(&email).await;

        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() -> TestResult {
        let id = LogMailer::new("no-reply@nrep.ug".into())
            .send_email(&reset_email())
            .await?;
        assert!(!id.is_empty());
        Ok(())
    }
}
