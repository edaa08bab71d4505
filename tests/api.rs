//! HTTP 수준 통합 테스트
//!
//! 서버를 띄우지 않고 `tower::ServiceExt::oneshot`으로 라우터를 직접 호출합니다.
//! 인메모리 SQLite와 `MemoryStorage`를 씁니다.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use lexdocs::{
    config::{parse_extension_list, Config},
    db,
    middleware::auth::create_access_token,
    routes::{self, AppState},
    services::storage::MemoryStorage,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const MAX_UPLOAD: u64 = 1024;

struct TestApp {
    router: Router,
    storage: Arc<MemoryStorage>,
    token: String,
}

async fn app_with_tokens(tokens: i64) -> TestApp {
    let pool = db::connect("sqlite::memory:").await.expect("pool");
    db::seed_if_empty(&pool, tokens).await.expect("seed");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: SECRET.to_string(),
        uploads_path: "unused".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        max_upload_bytes: MAX_UPLOAD,
        allowed_extensions: parse_extension_list("pdf,txt,md,docx"),
        upload_timeout: Duration::from_secs(5),
        ai_timeout: Duration::from_secs(5),
        initial_token_balance: tokens,
    };

    let storage = Arc::new(MemoryStorage::new());
    let state = AppState::new(pool, storage.clone(), &config);

    TestApp {
        router: routes::router(state, config.max_upload_bytes),
        storage,
        token: create_access_token("user-1", SECRET, chrono::Duration::minutes(15))
            .expect("token"),
    }
}

async fn app() -> TestApp {
    app_with_tokens(100_000).await
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, body.to_vec())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json body")
        };
        (status, value)
    }

    fn authed(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send_json(self.authed("GET", uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(
            self.authed("POST", uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn upload(&self, uri: &str, file_name: &str, bytes: &[u8]) -> (StatusCode, Value) {
        self.send_json(
            self.authed("POST", uri)
                .header("x-file-name", file_name)
                .body(Body::from(bytes.to_vec()))
                .unwrap(),
        )
        .await
    }

    /// 문서를 만들고 (문서 ID, 버전 1 ID)를 돌려줍니다.
    async fn create_document(&self, content: &str) -> (String, String) {
        let (status, body) = self
            .upload("/api/v1/documents?name=Lease&case_id=case-1", "lease.txt", content.as_bytes())
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["document"]["id"].as_str().unwrap().to_string(),
            body["version"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn add_version(&self, document_id: &str, content: &str) -> Value {
        let (status, body) = self
            .upload(
                &format!("/api/v1/documents/{document_id}/versions?change_note=revised"),
                "lease.txt",
                content.as_bytes(),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn version_numbers(&self, document_id: &str) -> Vec<i64> {
        let (status, body) = self
            .get(&format!("/api/v1/documents/{document_id}/versions"))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["versions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["version_number"].as_i64().unwrap())
            .collect()
    }
}

#[tokio::test]
async fn health_is_public_but_documents_need_a_token() {
    let app = app().await;

    let (status, body) = app
        .send_json(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app
        .send_json(
            Request::builder()
                .uri("/api/v1/documents")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "missing_token");
}

#[tokio::test]
async fn upload_version_list_and_download() {
    let app = app().await;
    let (doc_id, v1_id) = app.create_document("Rent is 100 per month.").await;

    let v2 = app.add_version(&doc_id, "Rent is 120 per month.").await;
    assert_eq!(v2["version_number"], 2);
    assert_eq!(v2["is_current"], true);
    assert_eq!(v2["change_note"], "revised");
    assert_eq!(v2["author_id"], "user-1");

    assert_eq!(app.version_numbers(&doc_id).await, vec![2, 1]);

    let (status, doc) = app.get(&format!("/api/v1/documents/{doc_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["version_count"], 2);
    assert_eq!(doc["file_url"], v2["file_url"]);

    let (status, bytes) = app
        .send(
            app.authed("GET", &format!("/api/v1/versions/{v1_id}/file"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"Rent is 100 per month.");

    let v2_id = v2["id"].as_str().unwrap();
    let (status, diff) = app
        .get(&format!(
            "/api/v1/documents/{doc_id}/diff?version_a={v2_id}&version_b={v1_id}"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(diff["swapped"], true);
    assert_eq!(diff["older_version_number"], 1);
    // "100" → "120": '0' 하나 삭제, '2' 하나 추가
    assert_eq!(diff["stats"]["added"], 1);
    assert_eq!(diff["stats"]["removed"], 1);
}

#[tokio::test]
async fn disallowed_extension_is_rejected_without_touching_storage() {
    let app = app().await;

    let (status, body) = app
        .upload("/api/v1/documents?name=Payload", "payload.exe", b"MZ")
        .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "unsupported_format");
    assert_eq!(app.storage.put_count(), 0);

    let (status, body) = app
        .upload("/api/v1/documents?name=Big", "big.txt", &vec![b'a'; MAX_UPLOAD as usize + 1])
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "file_too_large");
    assert_eq!(app.storage.put_count(), 0);

    let (status, _) = app.get("/api/v1/documents").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn current_version_is_protected_and_gaps_are_kept() {
    let app = app().await;
    let (doc_id, _) = app.create_document("one").await;
    let v2 = app.add_version(&doc_id, "two").await;
    let v3 = app.add_version(&doc_id, "three").await;

    let (status, body) = app
        .send_json(
            app.authed(
                "DELETE",
                &format!("/api/v1/documents/{doc_id}/versions/{}", v3["id"].as_str().unwrap()),
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_operation");

    let (status, _) = app
        .send(
            app.authed(
                "DELETE",
                &format!("/api/v1/documents/{doc_id}/versions/{}", v2["id"].as_str().unwrap()),
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.version_numbers(&doc_id).await, vec![3, 1]);
}

#[tokio::test]
async fn restore_and_approval() {
    let app = app().await;
    let (doc_id, v1_id) = app.create_document("original").await;
    app.add_version(&doc_id, "changed").await;

    let (status, restored) = app
        .post_json(
            &format!("/api/v1/documents/{doc_id}/versions/{v1_id}/restore"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(restored["version_number"], 3);
    assert_eq!(restored["change_note"], "Restored from version 1");

    let (status, approved) = app
        .send_json(
            app.authed("PUT", &format!("/api/v1/documents/{doc_id}/versions/{v1_id}/approval"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "approved": true }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["approved"], true);
}

#[tokio::test]
async fn comparison_is_cached_and_spends_once() {
    let app = app().await;
    let (doc_id, v1_id) = app.create_document("Fees are due in 30 days.").await;
    let v2 = app.add_version(&doc_id, "Fees are due in 15 days.").await;
    let v2_id = v2["id"].as_str().unwrap();
    let probe = format!(
        "/api/v1/documents/{doc_id}/comparisons?version1_id={v1_id}&version2_id={v2_id}"
    );

    let (status, body) = app.get(&probe).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    let (_, balance) = app.get("/api/v1/billing/balance").await;
    assert_eq!(balance["total_available"], 100_000);

    let (status, summary) = app
        .post_json(
            &format!("/api/v1/documents/{doc_id}/comparisons"),
            json!({ "version1_id": v2_id, "version2_id": v1_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["older_version_id"], v1_id.as_str());
    assert_eq!(summary["model"], "extractive-v1");
    let tokens = summary["tokens_used"].as_i64().unwrap();

    let (status, cached) = app.get(&probe).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached, summary);

    let (_, balance) = app.get("/api/v1/billing/balance").await;
    assert_eq!(balance["total_available"], 100_000 - tokens);
}

#[tokio::test]
async fn analysis_with_insufficient_tokens_returns_402() {
    let app = app_with_tokens(1).await;
    let (doc_id, _) = app
        .create_document("The tenant is liable for all damages caused by breach.")
        .await;

    let (status, body) = app
        .post_json(
            &format!("/api/v1/documents/{doc_id}/analyses"),
            json!({ "analysis_type": "overview" }),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "insufficient_tokens");
    assert_eq!(body["error"]["available"], 1);
    assert!(body["error"]["required"].as_i64().unwrap() > 1);
}

#[tokio::test]
async fn notes_and_metadata_updates() {
    let app = app().await;
    let (doc_id, _) = app.create_document("body").await;

    for _ in 0..2 {
        let (status, body) = app
            .send_json(
                app.authed("PUT", &format!("/api/v1/documents/{doc_id}/notes"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "notes": "call client" }).to_string()))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notes"], "call client");
    }

    let (status, doc) = app
        .send_json(
            app.authed("PATCH", &format!("/api/v1/documents/{doc_id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(
                    Body::from(
                        json!({ "case_id": null, "status": "review", "is_starred": true })
                            .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["case_id"], Value::Null);
    assert_eq!(doc["status"], "review");
    assert_eq!(doc["is_starred"], true);
    assert_eq!(doc["notes"], "call client");

    let (status, page) = app.get("/api/v1/documents?status=review").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);

    let (status, _) = app
        .send(
            app.authed("DELETE", &format!("/api/v1/documents/{doc_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.storage.is_empty());

    let (status, _) = app.get(&format!("/api/v1/documents/{doc_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
