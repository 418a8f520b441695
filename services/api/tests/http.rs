//! End-to-end tests of the HTTP surface against the in-memory backend.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use procurement_api::{
    config::Config,
    web::{router, AppState},
};
use procurement_core::memory::{
    InMemoryBlobStore, InMemoryCompensationLog, InMemoryCounterStore, InMemoryDocumentStore,
    InMemoryResetCodeStore, RecordingNotifier,
};
use procurement_core::ports::{Collection, PasswordHasher, PortResult};
use procurement_core::{Ports, SystemClock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use testresult::TestResult;
use tower::ServiceExt;

const BOUNDARY: &str = "nrep-test-boundary";

/// Stores passwords with a visible prefix; Argon2 is covered by its own tests.
struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash_password(&self, plain: &str) -> PortResult<String> {
        Ok(format!("hashed:{plain}"))
    }

    fn verify_password(&self, plain: &str, hash: &str) -> PortResult<bool> {
        Ok(hash == format!("hashed:{plain}"))
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

struct TestApp {
    router: Router,
    documents: Arc<InMemoryDocumentStore>,
    notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    fn new() -> TestResult<Self> {
        let env = HashMap::from([("STORE_BACKEND".to_string(), "memory".to_string())]);
        let config = Config::from_lookup(|key| env.get(key).cloned())?;
        let documents = Arc::new(InMemoryDocumentStore::procurement());
        let notifier = Arc::new(RecordingNotifier::default());
        let ports = Ports {
            documents: documents.clone(),
            blobs: Arc::new(InMemoryBlobStore::default()),
            counters: Arc::new(InMemoryCounterStore::default()),
            reset_codes: Arc::new(InMemoryResetCodeStore::default()),
            compensations: Arc::new(InMemoryCompensationLog::default()),
            notifier: notifier.clone(),
            hasher: Arc::new(PlainHasher),
            clock: Arc::new(SystemClock),
        };
        Ok(Self {
            router: router(Arc::new(AppState::new(ports, config))),
            documents,
            notifier,
        })
    }

    async fn raw(&self, request: Request<Body>) -> TestResult<(StatusCode, Vec<u8>)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, bytes.to_vec()))
    }

    async fn send(&self, request: Request<Body>) -> TestResult<(StatusCode, Value)> {
        let (status, bytes) = self.raw(request).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    async fn get(&self, uri: &str) -> TestResult<(StatusCode, Value)> {
        self.send(Request::get(uri).body(Body::empty())?).await
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> TestResult<(StatusCode, Value)> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await
    }

    async fn form(&self, uri: &str, parts: &[Part<'_>]) -> TestResult<(StatusCode, Value)> {
        self.send(
            Request::post(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(parts)))?,
        )
        .await
    }

    async fn register_supplier(&self, email: &str, password: &str) -> TestResult<(StatusCode, Value)> {
        self.form(
            "/supplier-register",
            &[
                Part::Text("companyName", "Acme Solar Ltd"),
                Part::Text("contactPerson", "Amina Okello"),
                Part::Text("accountEmail", email),
                Part::Text("password", password),
                Part::Text("phone", "+256700000000"),
                Part::Text("address", "Plot 12, Kampala Road"),
                Part::Text("country", "Uganda"),
                Part::Text("city", "Kampala"),
                Part::Text("productsServices", r#"["Solar installation"]"#),
                Part::File("documents", "profile.pdf", b"%PDF-1.4 profile"),
            ],
        )
        .await
    }

    async fn sign_in(&self, email: &str, password: &str, user_type: &str) -> TestResult<(StatusCode, Value)> {
        self.json(
            Method::POST,
            "/sign-in",
            json!({ "email": email, "password": password, "userType": user_type }),
        )
        .await
    }

    async fn create_service(&self, title: &str) -> TestResult<String> {
        let issued = (Utc::now() - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Millis, true);
        let deadline = (Utc::now() + Duration::days(30)).to_rfc3339_opts(SecondsFormat::Millis, true);
        let (status, body) = self
            .form(
                "/add-service",
                &[
                    Part::Text("title", title),
                    Part::Text("description", "Supply and installation of solar PV systems"),
                    Part::Text("category", "Works"),
                    Part::Text("deliverables", r#"["Design", "Installation"]"#),
                    Part::Text("issuanceDate", &issued),
                    Part::Text("submissionDeadline", &deadline),
                ],
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Ok(text(&body["data"]["procureID"]))
    }
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn health_reports_ok() -> TestResult {
    let app = TestApp::new()?;

    let (status, body) = app.get("/health").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn supplier_registers_and_signs_in() -> TestResult {
    let app = TestApp::new()?;

    let (status, body) = app.register_supplier("acme@co.com", "password1234").await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Supplier Account Created successfully!");
    assert_eq!(body["data"]["documents"].as_array().map(Vec::len), Some(1));

    let (status, body) = app.sign_in("acme@co.com", "password1234", "supplier").await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["accountEmail"], "acme@co.com");
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("password").is_none());

    let (status, body) = app.sign_in("acme@co.com", "wrong-password", "supplier").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.sign_in("nobody@co.com", "password1234", "supplier").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn duplicate_and_invalid_registrations_are_rejected() -> TestResult {
    let app = TestApp::new()?;
    app.register_supplier("acme@co.com", "password1234").await?;

    let (status, _) = app.register_supplier("acme@co.com", "password5678").await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.register_supplier("not-an-email", "short").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .map(|errors| errors.iter().filter_map(|e| e["field"].as_str()).collect())
        .unwrap_or_default();
    assert!(fields.contains(&"accountEmail"));
    assert!(fields.contains(&"password"));
    Ok(())
}

#[tokio::test]
async fn sign_in_requires_a_known_user_type() -> TestResult {
    let app = TestApp::new()?;

    let (status, body) = app.sign_in("acme@co.com", "password1234", "admin").await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "userType");
    Ok(())
}

#[tokio::test]
async fn password_reset_changes_the_password_once() -> TestResult {
    let app = TestApp::new()?;
    app.register_supplier("acme@co.com", "password1234").await?;

    let (status, body) = app
        .json(Method::POST, "/request-password-reset", json!({ "email": "acme@co.com" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["emailSent"], true);

    let sent = app.notifier.sent();
    let code = sent
        .last()
        .and_then(|email| email.text.as_deref())
        .and_then(|text| text.strip_prefix("Your password reset code is "))
        .and_then(|rest| rest.split('.').next())
        .unwrap_or_default()
        .to_string();
    assert!(!code.is_empty());

    let (status, _) = app
        .json(
            Method::POST,
            "/validate-otp-password-reset",
            json!({ "email": "acme@co.com", "code": code }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let change = json!({ "email": "acme@co.com", "code": code, "newPassword": "newpassword99" });
    let (status, body) = app.json(Method::POST, "/set-new-password", change.clone()).await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app.sign_in("acme@co.com", "newpassword99", "supplier").await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.json(Method::POST, "/set-new-password", change).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unknown_emails_cannot_request_a_reset() -> TestResult {
    let app = TestApp::new()?;

    let (status, _) = app
        .json(Method::POST, "/request-password-reset", json!({ "email": "ghost@co.com" }))
        .await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn supplier_applies_once_and_staff_reviews() -> TestResult {
    let app = TestApp::new()?;
    let (_, supplier) = app.register_supplier("acme@co.com", "password1234").await?;
    let supplier_id = text(&supplier["data"]["supplierID"]);
    let procure_id = app.create_service("Solar mini-grid installation").await?;

    let application_form = [
        Part::Text("supplierID", &supplier_id),
        Part::Text("procurementID", &procure_id),
        Part::File("incorporationCertificate", "certificate.pdf", b"%PDF-1.4 certificate"),
        Part::File("teamCv", "team.pdf", b"%PDF-1.4 team"),
    ];
    let (status, body) = app.form("/apply", &application_form).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let application_id = text(&body["data"]["applicationID"]);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["submittedDocuments"].as_array().map(Vec::len), Some(2));
    let certificate_id = text(&body["data"]["submittedDocuments"][0]["id"]);

    let (status, body) = app.form("/apply", &application_form).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        format!("Already applied for this procurement (REF.No.: {procure_id}).")
    );

    let (status, applied) = app.get(&format!("/applied?supplierID={supplier_id}")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applied.as_array().map(Vec::len), Some(1));

    let (status, details) = app
        .get(&format!(
            "/applied/service-details?supplierID={supplier_id}&applicationID={application_id}"
        ))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["postID"], procure_id.as_str());

    let (status, bytes) = app
        .raw(Request::get(format!("/document/view/{certificate_id}")).body(Body::empty())?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"%PDF-1.4 certificate");

    let (status, body) = app
        .json(
            Method::PUT,
            &format!("/applied/{application_id}/status-update"),
            json!({ "status": "shortlisted", "comments": "Strong technical proposal" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "shortlisted");
    assert_eq!(body["notified"], true);
    assert!(app
        .notifier
        .sent()
        .iter()
        .any(|email| email.to.contains(&"acme@co.com".to_string())));

    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/applied/{application_id}/status-update"),
            json!({ "status": "maybe" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn applications_without_required_documents_are_rejected() -> TestResult {
    let app = TestApp::new()?;
    let procure_id = app.create_service("Grid study").await?;

    let (status, body) = app
        .form(
            "/apply",
            &[
                Part::Text("supplierID", "NREP-SPL-2024-001"),
                Part::Text("procurementID", &procure_id),
                Part::File("incorporationCertificate", "certificate.pdf", b"%PDF-1.4"),
            ],
        )
        .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "teamCv is required and was not provided.");
    Ok(())
}

#[tokio::test]
async fn services_are_paginated_by_eight() -> TestResult {
    let app = TestApp::new()?;
    for n in 0..10 {
        app.create_service(&format!("Service {n}")).await?;
    }

    let (status, first) = app.get("/services/pages/status?page=1&statuses=active").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["documents"].as_array().map(Vec::len), Some(8));
    assert_eq!(first["hasNextPage"], true);
    assert_eq!(first["totalDocuments"], 10);

    let (_, second) = app.get("/services/pages/status?page=2").await?;
    assert_eq!(second["documents"].as_array().map(Vec::len), Some(2));
    assert_eq!(second["hasNextPage"], false);

    let (status, _) = app.get("/services/pages/status?page=0").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/services/pages/status?statuses=archived").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, open) = app.get("/services").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open.as_array().map(Vec::len), Some(10));
    let (_, expired) = app.get("/services?expired=true").await?;
    assert_eq!(expired.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn pages_past_the_end_come_back_empty() -> TestResult {
    let app = TestApp::new()?;
    app.create_service("Feasibility study").await?;
    app.register_supplier("acme@co.com", "password1234").await?;

    let (status, services) = app.get("/services/pages/status?page=4294967295").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(services["documents"].as_array().map(Vec::len), Some(0));
    assert_eq!(services["hasNextPage"], false);
    assert_eq!(services["totalDocuments"], 1);

    let (status, suppliers) = app.get("/suppliers/pages?page=4294967295").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suppliers["documents"].as_array().map(Vec::len), Some(0));
    assert_eq!(suppliers["hasNextPage"], false);
    Ok(())
}

#[tokio::test]
async fn service_list_flags_may_be_bare() -> TestResult {
    let app = TestApp::new()?;
    app.create_service("Feasibility study").await?;

    let (status, all) = app.get("/services?all").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(1));

    let (status, expired) = app.get("/services?expired").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(expired.as_array().map(Vec::len), Some(0));

    let (status, _) = app
        .raw(Request::get("/services?all=maybe").body(Body::empty())?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unknown_services_and_documents_are_not_found() -> TestResult {
    let app = TestApp::new()?;

    let (status, body) = app.get("/get-service/NREP-PRF-2024-999").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Procurement service not found");

    let (status, _) = app.get("/get-supplier/NREP-SPL-2024-999").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .raw(Request::get("/document/view/DOC-missing").body(Body::empty())?)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn suppliers_are_listed_with_application_counts() -> TestResult {
    let app = TestApp::new()?;
    let (_, supplier) = app.register_supplier("acme@co.com", "password1234").await?;
    app.register_supplier("volt@co.com", "password1234").await?;
    let supplier_id = text(&supplier["data"]["supplierID"]);
    let procure_id = app.create_service("Battery storage").await?;
    app.form(
        "/apply",
        &[
            Part::Text("supplierID", &supplier_id),
            Part::Text("procurementID", &procure_id),
            Part::File("incorporationCertificate", "certificate.pdf", b"%PDF-1.4"),
            Part::File("teamCv", "team.pdf", b"%PDF-1.4"),
        ],
    )
    .await?;

    let (status, all) = app.get("/suppliers").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(2));
    let (_, validated) = app.get("/suppliers?validated=true").await?;
    assert_eq!(validated.as_array().map(Vec::len), Some(0));

    let (status, page) = app.get("/suppliers/pages?page=1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalDocuments"], 2);
    let counts: HashMap<String, u64> = page["documents"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| (text(&row["supplierID"]), row["applicationCount"].as_u64().unwrap_or(0)))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(counts.get(&supplier_id), Some(&1));

    let (status, one) = app.get(&format!("/get-supplier/{supplier_id}")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["companyName"], "Acme Solar Ltd");
    Ok(())
}

#[tokio::test]
async fn provisioned_staff_sign_in_with_their_work_email() -> TestResult {
    let app = TestApp::new()?;
    let mut hr = serde_json::Map::new();
    hr.insert("staffID".into(), json!("NREP-STF-014"));
    hr.insert("workEmail".into(), json!("jane.doe@nrep.ug"));
    hr.insert("email1".into(), json!("jane@gmail.com"));
    hr.insert("password".into(), json!("hashed:staffpass1"));
    hr.insert("firstName".into(), json!("Jane"));
    hr.insert("surName".into(), json!("Doe"));
    app.documents.seed(Collection::HrStaff, "NREP-STF-014", hr);

    let (status, _) = app.sign_in("jane.doe@nrep.ug", "staffpass1", "staff").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(
            Method::POST,
            "/staff-register",
            json!({ "staffID": "NREP-STF-014", "role": "procurement-officer" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = app.sign_in("jane.doe@nrep.ug", "staffpass1", "staff").await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["firstName"], "Jane");
    assert_eq!(body["data"]["role"], "procurement-officer");

    let (status, _) = app
        .json(
            Method::POST,
            "/staff-register",
            json!({ "staffID": "NREP-STF-014", "role": "procurement-officer" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn categories_can_be_added_and_listed() -> TestResult {
    let app = TestApp::new()?;

    let (status, body) = app
        .json(
            Method::POST,
            "/categories",
            json!({ "name": "Consultancy", "classification": ["services"] }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, categories) = app.get("/get-categories").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories[0]["name"], "Consultancy");

    let (status, _) = app.json(Method::POST, "/categories", json!({ "name": "" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
