//! Coordinator review integration tests (C12).
//!
//! Black-box HTTP tests against a running sr-api server. Submissions only
//! reach `pending_review` after the ingest/OCR/metadata stage workers have
//! processed them (see sr-supervisor), so most of these tests assume a
//! submission id that is already sitting in `pending_review` in the target
//! environment (`SR_PENDING_SUBMISSION_ID`); the rest exercise error paths
//! that don't depend on pipeline state. All `#[ignore]`d pending a running
//! stack; run with `cargo test -- --ignored`.

use serde::{Deserialize, Serialize};

struct TestClient {
    http: reqwest::Client,
    base_url: String,
}

impl TestClient {
    fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: std::env::var("SR_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct PendingSubmissionsResponse {
    submissions: Vec<serde_json::Value>,
    total: u64,
    page: u32,
    per_page: u32,
}

#[derive(Debug, Serialize)]
struct RejectRequest {
    reason: String,
}

#[derive(Debug, Serialize)]
struct ApproveRequest {
    final_hours: Option<i64>,
    final_category_id: Option<i64>,
    override_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

fn pending_submission_id() -> Option<i64> {
    std::env::var("SR_PENDING_SUBMISSION_ID")
        .ok()
        .and_then(|s| s.parse().ok())
}

#[tokio::test]
#[ignore]
async fn list_pending_paginates_with_defaults() {
    let client = TestClient::new();
    let resp = client
        .http
        .get(&client.url("/api/v1/coordinator/pending"))
        .send()
        .await
        .expect("list pending request failed");

    assert!(resp.status().is_success());
    let body: PendingSubmissionsResponse = resp.json().await.expect("failed to parse pending list");
    assert_eq!(body.page, 1);
    assert!(body.per_page > 0);
    assert!(body.submissions.len() as u64 <= body.total);
}

#[tokio::test]
#[ignore]
async fn list_pending_filters_by_enrollment_number() {
    let client = TestClient::new();
    let resp = client
        .http
        .get(&client.url("/api/v1/coordinator/pending?enrollment=does-not-exist-0000"))
        .send()
        .await
        .expect("list pending request failed");

    assert!(resp.status().is_success());
    let body: PendingSubmissionsResponse = resp.json().await.expect("failed to parse pending list");
    assert_eq!(body.total, 0);
    assert!(body.submissions.is_empty());
}

#[tokio::test]
#[ignore]
async fn get_submission_detail_for_unknown_id_returns_not_found() {
    let client = TestClient::new();
    let resp = client
        .http
        .get(&client.url("/api/v1/coordinator/submission/999999999"))
        .send()
        .await
        .expect("detail request failed");

    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
#[ignore]
async fn reject_requires_non_empty_reason() {
    let Some(submission_id) = pending_submission_id() else {
        eprintln!("skipping: SR_PENDING_SUBMISSION_ID not set");
        return;
    };
    let client = TestClient::new();

    let resp = client
        .http
        .post(&client.url(&format!("/api/v1/coordinator/reject/{submission_id}")))
        .json(&RejectRequest { reason: "   ".to_string() })
        .send()
        .await
        .expect("reject request failed");

    assert_eq!(resp.status().as_u16(), 400);
    let error: ApiErrorResponse = resp.json().await.expect("failed to parse error body");
    assert!(error.error.to_lowercase().contains("rejection reason"));
}

#[tokio::test]
#[ignore]
async fn reject_pending_submission_marks_activity_rejected() {
    let Some(submission_id) = pending_submission_id() else {
        eprintln!("skipping: SR_PENDING_SUBMISSION_ID not set");
        return;
    };
    let client = TestClient::new();

    let resp = client
        .http
        .post(&client.url(&format!("/api/v1/coordinator/reject/{submission_id}")))
        .json(&RejectRequest {
            reason: "certificate does not match enrolled student".to_string(),
        })
        .send()
        .await
        .expect("reject request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("failed to parse activity response");
    assert_eq!(body["review_status"], "rejected");
}

#[tokio::test]
#[ignore]
async fn approve_with_overridden_hours_requires_override_reason() {
    let Some(submission_id) = pending_submission_id() else {
        eprintln!("skipping: SR_PENDING_SUBMISSION_ID not set");
        return;
    };
    let client = TestClient::new();

    let resp = client
        .http
        .post(&client.url(&format!("/api/v1/coordinator/approve/{submission_id}")))
        .json(&ApproveRequest {
            final_hours: Some(999),
            final_category_id: None,
            override_reason: None,
        })
        .send()
        .await
        .expect("approve request failed");

    assert_eq!(resp.status().as_u16(), 400);
    let error: ApiErrorResponse = resp.json().await.expect("failed to parse error body");
    assert!(error.error.to_lowercase().contains("override_reason"));
}

#[tokio::test]
#[ignore]
async fn approve_pending_submission_without_overrides_succeeds() {
    let Some(submission_id) = pending_submission_id() else {
        eprintln!("skipping: SR_PENDING_SUBMISSION_ID not set");
        return;
    };
    let client = TestClient::new();

    let resp = client
        .http
        .post(&client.url(&format!("/api/v1/coordinator/approve/{submission_id}")))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("approve request failed");

    assert!(resp.status().is_success(), "expected approve to succeed: {}", resp.status());
    let body: serde_json::Value = resp.json().await.expect("failed to parse activity response");
    assert_eq!(body["review_status"], "approved");
    assert!(body["final_hours"].is_number());
}

#[tokio::test]
#[ignore]
async fn approving_already_reviewed_submission_is_rejected() {
    let Some(submission_id) = pending_submission_id() else {
        eprintln!("skipping: SR_PENDING_SUBMISSION_ID not set");
        return;
    };
    let client = TestClient::new();

    // First call finalizes review (approve or reject, whichever the fixture left pending).
    let _ = client
        .http
        .post(&client.url(&format!("/api/v1/coordinator/approve/{submission_id}")))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("first approve request failed");

    let second = client
        .http
        .post(&client.url(&format!("/api/v1/coordinator/approve/{submission_id}")))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("second approve request failed");

    assert_eq!(second.status().as_u16(), 400);
}
