//! HTTP API Tests
//!
//! Drives the full router (layers included) with `tower::ServiceExt::oneshot`
//! against a temporary database.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p mindd --test api_tests
//! ```

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mind_common::db::MindDb;
use mind_common::notify::{Notification, NotificationKind, Notifier};
use mind_common::{MindResult, ProgressService, ServiceSettings};
use mindd::server::{self, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// Test Harness
// ============================================================================

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<Notification>>,
}

impl Notifier for Outbox {
    fn send(&self, notification: &Notification) -> MindResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

impl Outbox {
    /// Wait for the background dispatch and pull the 4-digit code out of the body
    async fn code_for(&self, kind: NotificationKind, to: &str) -> String {
        for _ in 0..100 {
            let found = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|n| n.kind == kind && n.to == to)
                .cloned();
            if let Some(n) = found {
                let digits: String = n
                    .body
                    .split(|c: char| !c.is_ascii_digit())
                    .find(|part| part.len() == 4)
                    .unwrap()
                    .to_string();
                return digits;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no {:?} notification for {}", kind, to);
    }
}

struct Harness {
    _dir: TempDir,
    app: Router,
    outbox: Arc<Outbox>,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let db = MindDb::open(dir.path().join("mind.db"), Duration::from_secs(2))
        .await
        .unwrap();
    let outbox = Arc::new(Outbox::default());
    let service = ProgressService::new(Arc::new(db), outbox.clone(), ServiceSettings::default());
    let app = server::router(AppState::new(service), Duration::from_secs(10), 65_536);
    Harness {
        _dir: dir,
        app,
        outbox,
    }
}

impl Harness {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    /// Register and verify a learner, returning its id
    async fn signup(&self, email: &str) -> i64 {
        let (status, _) = self
            .post(
                "/v1/accounts/register",
                json!({"name": "Ada", "email": email, "password": "secret1"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let code = self.outbox.code_for(NotificationKind::Verification, email).await;
        let (status, _) = self
            .post("/v1/accounts/verify", json!({"email": email, "code": code}))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, profile) = self
            .post("/v1/accounts/login", json!({"email": email, "password": "secret1"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["verified"], json!(true));
        profile["id"].as_i64().unwrap()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health() {
    let h = harness().await;
    let (status, body) = h.get("/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_new_learner_starts_at_level_one_with_full_energy() {
    let h = harness().await;
    let id = h.signup("ada@example.com").await;

    let (status, profile) = h.get(&format!("/v1/learners/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["energy"], 5);
    assert_eq!(profile["coins"], 0);

    let (_, progress) = h.get(&format!("/v1/progress/{}/python", id)).await;
    assert_eq!(progress["unlocked_level"], 1);
}

#[tokio::test]
async fn test_completion_then_badges() {
    let h = harness().await;
    let id = h.signup("ada@example.com").await;

    let claim = json!({"learner_id": id, "course": "python", "level": 1, "mistakes": 0});
    let (status, outcome) = h.post("/v1/progress", claim.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["approved"], true);
    assert_eq!(outcome["coins_awarded"], 20);
    assert_eq!(outcome["unlocked_level"], 2);

    // Retry after a dropped response pays nothing
    let (_, retry) = h.post("/v1/progress", claim).await;
    assert_eq!(retry["coins_awarded"], 0);

    let (_, badges) = h.get(&format!("/v1/learners/{}/badges", id)).await;
    let names: Vec<&str> = badges
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Primeros Pasos", "Perfeccionista"]);
}

#[tokio::test]
async fn test_energy_and_store_errors_keep_their_kind() {
    let h = harness().await;
    let id = h.signup("ada@example.com").await;

    let (status, body) = h
        .post("/v1/store/purchase", json!({"learner_id": id, "item": "recarga_1"}))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["kind"], "insufficient_funds");

    let (status, body) = h
        .post("/v1/store/purchase", json!({"learner_id": id, "item": "nope"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_item");

    let (status, body) = h
        .post(&format!("/v1/learners/{}/energy", id), json!({"delta": 3}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_request");

    let (status, body) = h
        .post(&format!("/v1/learners/{}/energy", id), json!({"delta": -5}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"energy": 0, "blocked": true}));
}

#[tokio::test]
async fn test_full_tank_purchase_is_unprocessable() {
    let h = harness().await;
    let id = h.signup("ada@example.com").await;

    for level in 1..=2 {
        h.post(
            "/v1/progress",
            json!({"learner_id": id, "course": "js", "level": level, "mistakes": 0}),
        )
        .await;
    }

    let (status, body) = h
        .post("/v1/store/purchase", json!({"learner_id": id, "item": "recarga_1"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "energy_full");

    h.post(&format!("/v1/learners/{}/energy", id), json!({"delta": -2}))
        .await;
    let (status, receipt) = h
        .post("/v1/store/purchase", json!({"learner_id": id, "item": "recarga_1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["coins"], 30);
    assert_eq!(receipt["energy"], 4);
}

#[tokio::test]
async fn test_unknown_learner_and_lesson_are_404() {
    let h = harness().await;

    let (status, body) = h.get("/v1/learners/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    let (status, _) = h.get("/v1/lessons/python/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let h = harness().await;
    let id = h.signup("ada@example.com").await;

    let (status, body) = h
        .post(
            "/v1/progress",
            json!({"learner_id": id, "course": "python", "level": -1, "mistakes": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_request");
    assert!(body["error"]["message"].is_string());

    let (status, body) = h.get("/v1/learners/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_request");
}

#[tokio::test]
async fn test_last_representable_level_is_rejected() {
    let h = harness().await;
    let id = h.signup("ada@example.com").await;

    let (status, body) = h
        .post(
            "/v1/progress",
            json!({"learner_id": id, "course": "python", "level": u32::MAX, "mistakes": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_request");

    let (status, body) = h.get(&format!("/v1/progress/{}/python", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unlocked_level"], 1);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let h = harness().await;
    h.signup("ada@example.com").await;

    let (status, body) = h
        .post("/v1/accounts/login", json!({"email": "ada@example.com", "password": "wrong!!"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "invalid_credentials");
}

#[tokio::test]
async fn test_password_recovery_flow() {
    let h = harness().await;
    h.signup("ada@example.com").await;

    let (status, _) = h
        .post("/v1/accounts/recovery", json!({"email": "ada@example.com"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = h
        .outbox
        .code_for(NotificationKind::PasswordReset, "ada@example.com")
        .await;

    let (status, _) = h
        .post(
            "/v1/accounts/recovery/validate",
            json!({"email": "ada@example.com", "code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .post(
            "/v1/accounts/recovery/reset",
            json!({"email": "ada@example.com", "code": code, "new_password": "brandnew"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .post("/v1/accounts/login", json!({"email": "ada@example.com", "password": "brandnew"}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_store_items_listed() {
    let h = harness().await;
    let (status, items) = h.get("/v1/store/items").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items[0]["key"], "recarga_1");
    assert_eq!(items[1]["cost"], 40);
}

#[tokio::test]
async fn test_support_message_is_forwarded() {
    let h = harness().await;
    let (status, _) = h
        .post(
            "/v1/support",
            json!({"email": "ada@example.com", "message": "Level 3 will not load"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..100 {
        if !h.outbox.sent.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let sent = h.outbox.sent.lock().unwrap();
    assert_eq!(sent[0].kind, NotificationKind::Support);
    assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.com"));
}
