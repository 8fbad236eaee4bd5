use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use freshscan_server::analysis::{AnalysisError, AnalysisProvider, SyntheticAnalyzer};
use freshscan_server::auth::Authenticator;
use freshscan_server::blob_store::BlobStore;
use freshscan_server::{build_router, AppState, ServerConfig};
use freshscan_shared::session::{generate_signing_key, issue_session_token};
use freshscan_shared::{ContentType, Freshness, NutritionClass};
use freshscan_store::{AnalysisOutcome, Database, FileMeta};

// -- Fixtures -------------------------------------------------------------

struct TestApp {
    router: Router,
    state: AppState,
    key: SigningKey,
    _dir: TempDir,
}

struct FailingAnalyzer;

#[async_trait]
impl AnalysisProvider for FailingAnalyzer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn analyze(
        &self,
        _bytes: &[u8],
        _content_type: ContentType,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        Err(AnalysisError::Provider("model unavailable".into()))
    }
}

/// Reports a score outside 0..=100.
struct OutOfRangeAnalyzer;

#[async_trait]
impl AnalysisProvider for OutOfRangeAnalyzer {
    fn name(&self) -> &str {
        "out-of-range"
    }

    async fn analyze(
        &self,
        _bytes: &[u8],
        _content_type: ContentType,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        Ok(AnalysisOutcome {
            quality_score: 150,
            freshness: Freshness::Excellent,
            nutrition: NutritionClass::High,
            recommendations: vec!["Eat soon".into()],
            warnings: Vec::new(),
            processing_time_ms: 5,
            model_version: "broken-v0".into(),
            confidence: 0.9,
        })
    }
}

async fn build_app(analyzer: Arc<dyn AnalysisProvider>, max_upload: u64) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = ServerConfig {
        database_path: dir.path().join("freshscan.db"),
        blob_storage_path: dir.path().join("uploads"),
        max_upload_size: max_upload,
        analysis_delay: Duration::ZERO,
        analysis_timeout: Duration::from_secs(5),
        argon2_memory_kib: 8,
        argon2_iterations: 1,
        ..ServerConfig::default()
    };

    let key = generate_signing_key();
    let db = Database::open_at(&config.database_path).unwrap();
    let blob_store = BlobStore::new(config.blob_storage_path.clone(), max_upload)
        .await
        .unwrap();
    let auth = Authenticator::new(key.clone(), chrono::Duration::hours(1), 8, 1).unwrap();

    let state = AppState::new(db, blob_store, analyzer, auth, config);
    TestApp {
        router: build_router(state.clone()),
        state,
        key,
        _dir: dir,
    }
}

async fn test_app() -> TestApp {
    build_app(
        Arc::new(SyntheticAnalyzer::new(Some(11), Duration::ZERO)),
        10 * 1024 * 1024,
    )
    .await
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(http::Method::POST)
                .uri(uri)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn delete(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(http::Method::DELETE)
            .uri(uri)
            .header(http::header::AUTHORIZATION, format!("Bearer {token}"));
        let request = match body {
            Some(body) => builder
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Register and log in, returning `(token, account_id)`.
    async fn sign_up(&self, email: &str) -> (String, Uuid) {
        let (status, _) = self
            .post_json(
                "/auth/register",
                json!({"name": "Tester", "email": email, "secret": "secret123456"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .post_json(
                "/auth/login",
                json!({"email": email, "secret": "secret123456"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        let id = body["account"]["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }

    async fn upload(
        &self,
        token: &str,
        field: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let (header, body) = multipart_body(field, "photo.jpg", content_type, data);
        self.send(
            Request::builder()
                .method(http::Method::POST)
                .uri("/scan/analyze")
                .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
                .header(http::header::CONTENT_TYPE, header)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    fn stored_blobs(&self) -> usize {
        std::fs::read_dir(&self.state.config.blob_storage_path)
            .unwrap()
            .count()
    }

    /// Insert a scan with a chosen score straight into the database.
    fn seed_scan(
        &self,
        owner: Uuid,
        score: u8,
        freshness: Freshness,
        at: DateTime<Utc>,
    ) -> Uuid {
        let db = self.state.db.lock().unwrap();
        let outcome = AnalysisOutcome {
            quality_score: score,
            freshness,
            nutrition: NutritionClass::Medium,
            recommendations: vec!["Refrigerate".into()],
            warnings: vec![],
            processing_time_ms: 5,
            model_version: "seed".into(),
            confidence: 0.8,
        };
        let file = FileMeta {
            file_name: "seed.jpg".into(),
            content_type: ContentType::Jpeg,
            file_size: 10,
        };
        let blob = format!("seed-{}.jpg", Uuid::new_v4().simple());
        db.insert_scan(owner, file, outcome, &blob, at).unwrap().id
    }
}

fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "freshscan-test-boundary";
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn jpeg_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let app = test_app().await;
    let (status, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = test_app().await;
    let (status, body) = app
        .send(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn register_duplicate_email_is_case_insensitive() {
    let app = test_app().await;
    let (status, body) = app
        .post_json(
            "/auth/register",
            json!({"name": "Alice", "email": "alice@example.com", "secret": "secret123456"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["account"]["email"], "alice@example.com");
    assert!(body["account"].get("passwordHash").is_none());

    let (status, body) = app
        .post_json(
            "/auth/register",
            json!({"name": "Alice", "email": "ALICE@example.com", "secret": "another-secret"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "duplicate_account");
}

#[tokio::test]
async fn register_rejects_invalid_input() {
    let app = test_app().await;
    for body in [
        json!({"name": "", "email": "a@example.com", "secret": "secret123456"}),
        json!({"name": "A", "email": "nope", "secret": "secret123456"}),
        json!({"name": "A", "email": "a@example.com", "secret": "short"}),
        json!({"name": "A"}),
    ] {
        let (status, resp) = app.post_json("/auth/register", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(resp["kind"], "invalid_input");
    }
}

#[tokio::test]
async fn login_errors_do_not_reveal_account_existence() {
    let app = test_app().await;
    app.sign_up("alice@example.com").await;

    let wrong_secret = app
        .post_json(
            "/auth/login",
            json!({"email": "alice@example.com", "secret": "wrong-secret"}),
        )
        .await;
    let unknown_email = app
        .post_json(
            "/auth/login",
            json!({"email": "nobody@example.com", "secret": "secret123456"}),
        )
        .await;

    assert_eq!(wrong_secret.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_secret, unknown_email);
    assert_eq!(wrong_secret.1["kind"], "invalid_credentials");
}

#[tokio::test]
async fn verify_requires_valid_token() {
    let app = test_app().await;
    let (token, id) = app.sign_up("alice@example.com").await;

    let (status, body) = app
        .send(Request::builder().uri("/auth/verify").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, body) = app.get("/auth/verify", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["id"], id.to_string());
}

#[tokio::test]
async fn expired_and_tampered_tokens_are_distinguished() {
    let app = test_app().await;
    let (token, id) = app.sign_up("alice@example.com").await;

    let (expired, _) = issue_session_token(
        id,
        Utc::now() - chrono::Duration::hours(3),
        chrono::Duration::hours(1),
        &app.key,
    )
    .unwrap();
    let (status, body) = app.get("/auth/verify", &expired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "token_expired");

    let (payload, _) = token.split_once('.').unwrap();
    let tampered = format!("{payload}.AAAA");
    let (status, body) = app.get("/auth/verify", &tampered).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "token_invalid");

    let other_key = generate_signing_key();
    let (foreign, _) =
        issue_session_token(id, Utc::now(), chrono::Duration::hours(1), &other_key).unwrap();
    let (status, body) = app.get("/auth/verify", &foreign).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "token_invalid");
}

#[tokio::test]
async fn end_to_end_upload_and_history() {
    let app = test_app().await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let data = jpeg_bytes(2 * 1024 * 1024);
    let (status, body) = app.upload(&token, "file", "image/jpeg", &data).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let scan = &body["scan"];
    let score = scan["qualityScore"].as_u64().unwrap();
    assert!(score <= 100);
    let freshness = scan["freshness"].as_str().unwrap();
    assert!(["Excellent", "Good", "Fair", "Poor"].contains(&freshness));
    assert_eq!(scan["fileSize"], data.len() as u64);
    assert_eq!(scan["contentType"], "image/jpeg");
    assert_eq!(scan["fileName"], "photo.jpg");
    assert!(scan.get("blobName").is_none());

    let (status, history) = app.get("/scan/history?page=1&limit=10", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["records"].as_array().unwrap().len(), 1);
    assert_eq!(history["pagination"]["total"], 1);
    assert_eq!(history["pagination"]["pages"], 1);

    let image_path = scan["imagePath"].as_str().unwrap();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(image_path)
                .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[http::header::CONTENT_TYPE], "image/jpeg");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), data.as_slice());
}

#[tokio::test]
async fn upload_requires_auth() {
    let app = test_app().await;
    let (header, body) = multipart_body("file", "a.jpg", "image/jpeg", b"abc");
    let (status, _) = app
        .send(
            Request::builder()
                .method(http::Method::POST)
                .uri("/scan/analyze")
                .header(http::header::CONTENT_TYPE, header)
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.stored_blobs(), 0);
}

#[tokio::test]
async fn unsupported_type_is_rejected_without_storing() {
    let app = test_app().await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let (status, body) = app.upload(&token, "file", "text/plain", b"hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "unsupported_type");
    assert_eq!(app.stored_blobs(), 0);

    let (_, history) = app.get("/scan/history", &token).await;
    assert_eq!(history["pagination"]["total"], 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected_without_storing() {
    let app = build_app(
        Arc::new(SyntheticAnalyzer::new(Some(1), Duration::ZERO)),
        64 * 1024,
    )
    .await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let (status, body) = app
        .upload(&token, "file", "image/png", &jpeg_bytes(64 * 1024 + 1))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "payload_too_large");
    assert_eq!(app.stored_blobs(), 0);

    let (status, _) = app
        .upload(&token, "file", "image/png", &jpeg_bytes(64 * 1024))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stored_blobs(), 1);
}

#[tokio::test]
async fn missing_file_field_is_invalid() {
    let app = test_app().await;
    let (token, _) = app.sign_up("alice@example.com").await;
    let (status, body) = app.upload(&token, "picture", "image/jpeg", b"abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn analysis_failure_leaves_nothing_behind() {
    let app = build_app(Arc::new(FailingAnalyzer), 10 * 1024 * 1024).await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let (status, body) = app.upload(&token, "file", "image/jpeg", b"jpeg").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "analysis_failed");
    assert!(!body["error"].as_str().unwrap().contains("model unavailable"));
    assert_eq!(app.stored_blobs(), 0);

    let (_, history) = app.get("/scan/history", &token).await;
    assert_eq!(history["pagination"]["total"], 0);
}

#[tokio::test]
async fn out_of_range_analysis_is_a_server_failure() {
    let app = build_app(Arc::new(OutOfRangeAnalyzer), 10 * 1024 * 1024).await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let (status, body) = app.upload(&token, "file", "image/png", b"png").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "analysis_failed");
    assert_eq!(body["error"], "Analysis failed");
    assert_eq!(app.stored_blobs(), 0);

    let (_, history) = app.get("/scan/history", &token).await;
    assert_eq!(history["pagination"]["total"], 0);
}

#[tokio::test]
async fn scans_are_isolated_between_accounts() {
    let app = test_app().await;
    let (alice, _) = app.sign_up("alice@example.com").await;
    let (bob, _) = app.sign_up("bob@example.com").await;

    let (_, body) = app.upload(&alice, "file", "image/webp", b"webp").await;
    let id = body["scan"]["id"].as_str().unwrap().to_string();

    for uri in [format!("/scan/{id}"), format!("/scan/{id}/image")] {
        let (status, body) = app.get(&uri, &bob).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["kind"], "not_found");
    }
    let (status, _) = app.delete(&format!("/scan/{id}"), &bob, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = app.get("/scan/history", &bob).await;
    assert_eq!(history["pagination"]["total"], 0);

    let (status, body) = app.get(&format!("/scan/{id}"), &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scan"]["id"], id);

    let (status, _) = app.get("/scan/not-a-uuid", &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_filters_by_score_range_and_freshness() {
    let app = test_app().await;
    let (token, owner) = app.sign_up("alice@example.com").await;
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let seeded = [
        (95, Freshness::Excellent),
        (89, Freshness::Good),
        (75, Freshness::Good),
        (70, Freshness::Fair),
        (69, Freshness::Good),
        (40, Freshness::Poor),
    ];
    for (i, (score, freshness)) in seeded.iter().enumerate() {
        app.seed_scan(owner, *score, *freshness, base + chrono::Duration::minutes(i as i64));
    }

    let (status, body) = app
        .get("/scan/history?minScore=70&maxScore=89", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut scores: Vec<u64> = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["qualityScore"].as_u64().unwrap())
        .collect();
    scores.sort_unstable();
    assert_eq!(scores, vec![70, 75, 89]);

    let (_, body) = app
        .get("/scan/history?minScore=70&maxScore=89&freshness=Good", &token)
        .await;
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["freshness"] == "Good"));
    // Newest first.
    assert_eq!(records[0]["qualityScore"], 75);
    assert_eq!(records[1]["qualityScore"], 89);

    for bad in [
        "/scan/history?minScore=90&maxScore=10",
        "/scan/history?freshness=Rotten",
        "/scan/history?limit=0",
        "/scan/history?page=0",
        "/scan/history?minScore=abc",
    ] {
        let (status, body) = app.get(bad, &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(body["kind"], "invalid_input");
    }
}

#[tokio::test]
async fn pagination_covers_every_record_once() {
    let app = test_app().await;
    let (token, owner) = app.sign_up("alice@example.com").await;
    let at = Utc.with_ymd_and_hms(2024, 5, 5, 8, 0, 0).unwrap();

    let mut expected = HashSet::new();
    for i in 0..25u8 {
        // Groups of five share a timestamp to exercise the tie-break.
        let when = at + chrono::Duration::seconds(i64::from(i / 5));
        expected.insert(app.seed_scan(owner, 50 + i, Freshness::Fair, when).to_string());
    }

    let mut seen = HashSet::new();
    for page in 1..=3 {
        let (status, body) = app
            .get(&format!("/scan/history?page={page}&limit=10"), &token)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 25);
        assert_eq!(body["pagination"]["pages"], 3);
        for record in body["records"].as_array().unwrap() {
            let id = record["id"].as_str().unwrap().to_string();
            assert!(seen.insert(id), "record returned twice");
        }
    }
    assert_eq!(seen, expected);

    let (_, body) = app.get("/scan/history?page=4&limit=10", &token).await;
    assert!(body["records"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stats_for_new_account_are_zero() {
    let app = test_app().await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let (status, body) = app.get("/user/stats", &token).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["stats"];
    assert_eq!(stats["totalScans"], 0);
    assert_eq!(stats["averageScore"], 0);
    assert!(stats["lastScanDate"].is_null());
    for key in ["excellent", "good", "fair", "poor"] {
        assert_eq!(stats["freshness"][key], 0);
        assert_eq!(stats["scoreBands"][key], 0);
    }
    assert_eq!(stats["monthly"].as_object().unwrap().len(), 6);
}

#[tokio::test]
async fn stats_aggregate_own_scans_only() {
    let app = test_app().await;
    let (alice, alice_id) = app.sign_up("alice@example.com").await;
    let (_, bob_id) = app.sign_up("bob@example.com").await;

    let now = Utc::now();
    app.seed_scan(alice_id, 90, Freshness::Excellent, now);
    app.seed_scan(alice_id, 71, Freshness::Good, now);
    app.seed_scan(bob_id, 10, Freshness::Poor, now);

    let (_, body) = app.get("/user/stats", &alice).await;
    let stats = &body["stats"];
    assert_eq!(stats["totalScans"], 2);
    assert_eq!(stats["averageScore"], 81);
    assert_eq!(stats["scoreBands"]["excellent"], 1);
    assert_eq!(stats["scoreBands"]["good"], 1);
    assert_eq!(stats["scoreBands"]["poor"], 0);
    assert_eq!(stats["freshness"]["excellent"], 1);
    assert!(!stats["lastScanDate"].is_null());

    let month = now.format("%Y-%m").to_string();
    assert_eq!(stats["monthly"][month.as_str()], 2);
}

#[tokio::test]
async fn delete_scan_removes_record_and_blob() {
    let app = test_app().await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let (_, body) = app.upload(&token, "file", "application/pdf", b"%PDF-1.4").await;
    let id = body["scan"]["id"].as_str().unwrap().to_string();
    assert_eq!(app.stored_blobs(), 1);

    let (status, body) = app.delete(&format!("/scan/{id}"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert_eq!(app.stored_blobs(), 0);

    let (status, _) = app.get(&format!("/scan/{id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/scan/{id}"), &token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_can_be_read_and_renamed() {
    let app = test_app().await;
    let (token, _) = app.sign_up("alice@example.com").await;

    let (status, body) = app.get("/user/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["name"], "Tester");

    let (status, body) = app
        .send(
            Request::builder()
                .method(http::Method::PUT)
                .uri("/user/profile")
                .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"name": "Alice"}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["name"], "Alice");
}

#[tokio::test]
async fn account_deletion_checks_secret_and_removes_everything() {
    let app = test_app().await;
    let (token, _) = app.sign_up("alice@example.com").await;
    app.upload(&token, "file", "image/jpeg", b"one").await;
    app.upload(&token, "file", "image/png", b"two").await;
    assert_eq!(app.stored_blobs(), 2);

    let (status, body) = app
        .delete("/user/account", &token, Some(json!({"secret": "not-my-secret"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "invalid_credentials");
    assert_eq!(app.stored_blobs(), 2);
    let (_, history) = app.get("/scan/history", &token).await;
    assert_eq!(history["pagination"]["total"], 2);

    let (status, body) = app
        .delete("/user/account", &token, Some(json!({"secret": "secret123456"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert_eq!(app.stored_blobs(), 0);

    // The token is still well-formed but its account is gone.
    let (status, body) = app.get("/auth/verify", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, _) = app
        .post_json(
            "/auth/login",
            json!({"email": "alice@example.com", "secret": "secret123456"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
