//! Certificate submission integration tests (C7, C13).
//!
//! Black-box HTTP tests against a running sr-api server, mirroring the
//! server's own request/response shapes. Requires:
//! - A running sr-api instance at SR_API_URL (default http://localhost:3000)
//! - A Postgres/S3/NATS stack behind it with at least one registered student
//!
//! All tests are `#[ignore]`d since they need that external stack; run with
//! `cargo test -- --ignored` once the stack is up.

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;

struct TestConfig {
    api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("SR_API_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        }
    }
}

struct TestClient {
    http: reqwest::Client,
    config: TestConfig,
}

impl TestClient {
    fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            config: TestConfig::default(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Serialize)]
struct RegisterStudentRequest {
    enrollment_number: String,
    name: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmissionResponse {
    id: i64,
    status: String,
    file_checksum: String,
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

async fn register_student(client: &TestClient, enrollment_number: &str) {
    let resp = client
        .http
        .post(&client.url("/api/v1/student/register"))
        .json(&RegisterStudentRequest {
            enrollment_number: enrollment_number.to_string(),
            name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
        })
        .send()
        .await
        .expect("register request failed");

    assert!(
        resp.status().is_success() || resp.status().as_u16() == 409,
        "unexpected status registering student: {}",
        resp.status()
    );
}

async fn submit_pdf(client: &TestClient, enrollment_number: &str, bytes: &[u8]) -> reqwest::Response {
    let part = Part::bytes(bytes.to_vec())
        .file_name("certificate.pdf")
        .mime_str("application/pdf")
        .unwrap();
    let form = Form::new()
        .text("enrollment_number", enrollment_number.to_string())
        .part("file", part);

    client
        .http
        .post(&client.url("/api/v1/certificate/submit"))
        .multipart(form)
        .send()
        .await
        .expect("submit request failed")
}

#[tokio::test]
#[ignore]
async fn submit_then_status_reflects_queued_submission() {
    let client = TestClient::new();
    let enrollment_number = format!("2024{}", std::process::id());
    register_student(&client, &enrollment_number).await;

    let resp = submit_pdf(&client, &enrollment_number, b"%PDF-1.4 test certificate bytes").await;
    assert_eq!(resp.status().as_u16(), 201, "expected 201 Created on submit");

    let submission: SubmissionResponse = resp.json().await.expect("failed to parse submission");
    assert_eq!(submission.status, "queued");
    assert!(!submission.file_checksum.is_empty());

    let status_resp = client
        .http
        .get(&client.url(&format!("/api/v1/certificate/status/{}", submission.id)))
        .send()
        .await
        .expect("status request failed");
    assert!(status_resp.status().is_success());

    let status: SubmissionResponse = status_resp.json().await.expect("failed to parse status");
    assert_eq!(status.id, submission.id);
}

#[tokio::test]
#[ignore]
async fn duplicate_upload_for_same_student_is_rejected() {
    let client = TestClient::new();
    let enrollment_number = format!("2025{}", std::process::id());
    register_student(&client, &enrollment_number).await;

    let bytes = b"%PDF-1.4 duplicate detection payload".to_vec();
    let first = submit_pdf(&client, &enrollment_number, &bytes).await;
    assert_eq!(first.status().as_u16(), 201);

    let second = submit_pdf(&client, &enrollment_number, &bytes).await;
    assert_eq!(
        second.status().as_u16(),
        409,
        "second identical upload should be rejected as a duplicate"
    );
    let error: ApiErrorResponse = second.json().await.expect("failed to parse error body");
    assert!(error.error.to_lowercase().contains("already exists"));
}

#[tokio::test]
#[ignore]
async fn submit_for_unknown_student_returns_not_found() {
    let client = TestClient::new();
    let resp = submit_pdf(&client, "does-not-exist-0000", b"%PDF-1.4 irrelevant").await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
#[ignore]
async fn submit_rejects_unsupported_extension() {
    let client = TestClient::new();
    let enrollment_number = format!("2026{}", std::process::id());
    register_student(&client, &enrollment_number).await;

    let part = Part::bytes(b"not a certificate".to_vec()).file_name("certificate.exe");
    let form = Form::new()
        .text("enrollment_number", enrollment_number)
        .part("file", part);

    let resp = client
        .http
        .post(&client.url("/api/v1/certificate/submit"))
        .multipart(form)
        .send()
        .await
        .expect("submit request failed");

    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
#[ignore]
async fn list_student_submissions_returns_uploaded_items() {
    let client = TestClient::new();
    let enrollment_number = format!("2027{}", std::process::id());
    register_student(&client, &enrollment_number).await;

    submit_pdf(&client, &enrollment_number, b"%PDF-1.4 listing test").await;

    let resp = client
        .http
        .get(&client.url(&format!(
            "/api/v1/certificate/student/{}/submissions",
            enrollment_number
        )))
        .send()
        .await
        .expect("list request failed");
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.expect("failed to parse list response");
    let submissions = body["submissions"].as_array().expect("submissions should be an array");
    assert!(!submissions.is_empty());
}

#[tokio::test]
#[ignore]
async fn health_endpoint_reports_ok_against_live_database() {
    let client = TestClient::new();
    let resp = client
        .http
        .get(&client.url("/health"))
        .send()
        .await
        .expect("health request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("failed to parse health response");
    assert_eq!(body, json!({"status": "ok", "database": "ok"}));
}
