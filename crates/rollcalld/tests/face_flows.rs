//! End-to-end flows against a live router, a real SQLite store and blob
//! directory, and a stub face-model service.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rollcall_core::service::FaceRecords;
use rollcall_core::types::{FaceMetadata, NewUserFace};
use rollcalld::{app, state, AppState, Config};
use serde_json::{json, Value};

fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

#[derive(Clone)]
struct Upstream {
    embed_status: u16,
    embed_body: Value,
    verify_status: u16,
    verify_body: Value,
    hits: Arc<Mutex<Vec<String>>>,
}

impl Upstream {
    fn healthy() -> Self {
        Self {
            embed_status: 200,
            embed_body: json!({
                "ok": true,
                "embedding": [0.1, 0.2, 0.3, 0.4],
                "embedding_dim": 128,
                "model": "ArcFace",
            }),
            verify_status: 200,
            verify_body: json!({ "verified": true, "distance": 0.2 }),
            hits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn embed_failing(status: u16, body: Value) -> Self {
        Self {
            embed_status: status,
            embed_body: body,
            ..Self::healthy()
        }
    }
}

async fn stub_embed(State(up): State<Upstream>) -> Response {
    up.hits.lock().unwrap().push("embed".to_string());
    (
        StatusCode::from_u16(up.embed_status).unwrap(),
        Json(up.embed_body.clone()),
    )
        .into_response()
}

async fn stub_verify(State(up): State<Upstream>) -> Response {
    up.hits.lock().unwrap().push("verify".to_string());
    (
        StatusCode::from_u16(up.verify_status).unwrap(),
        Json(up.verify_body.clone()),
    )
        .into_response()
}

async fn stub_reference(State(up): State<Upstream>) -> Response {
    up.hits.lock().unwrap().push("ref".to_string());
    png_bytes().into_response()
}

async fn spawn_upstream(up: Upstream) -> String {
    let router = Router::new()
        .route("/embed", post(stub_embed))
        .route("/verify", post(stub_verify))
        .route("/ref.jpg", get(stub_reference))
        .with_state(up);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

struct TestApp {
    base: String,
    upstream_base: String,
    state: AppState,
    blob_root: PathBuf,
    hits: Arc<Mutex<Vec<String>>>,
    _data: tempfile::TempDir,
}

impl TestApp {
    fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

async fn spawn_app(upstream: Upstream) -> TestApp {
    let data = tempfile::tempdir().unwrap();
    let hits = upstream.hits.clone();
    let upstream_base = spawn_upstream(upstream).await;

    let config = Config {
        http_bind: "127.0.0.1:0".to_string(),
        db_path: data.path().join("rollcall.db"),
        blob_root: data.path().join("blobs"),
        face_api_url: upstream_base.clone(),
        call_timeout_secs: 5,
        fetch_timeout_secs: 5,
    };
    let state = state::init(&config).await.unwrap();
    let router = app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        base: format!("http://{addr}"),
        upstream_base,
        state,
        blob_root: config.blob_root,
        hits,
        _data: data,
    }
}

async fn seed_user(app: &TestApp, email: &str) -> i64 {
    app.state
        .users
        .upsert_by_email("Boni", email, "password123")
        .await
        .unwrap()
        .id
}

fn stored_blobs(root: &Path) -> usize {
    match std::fs::read_dir(root.join("user-faces")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

fn register_form(user_id: i64, primary: bool, bytes: Vec<u8>) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("user_id", user_id.to_string())
        .text("is_primary", if primary { "true" } else { "false" })
        .part(
            "image",
            reqwest::multipart::Part::bytes(bytes).file_name("selfie.png"),
        )
}

fn verify_form(user_id: i64) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("user_id", user_id.to_string())
        .part(
            "image",
            reqwest::multipart::Part::bytes(png_bytes()).file_name("probe.png"),
        )
}

#[tokio::test]
async fn test_register_and_verify_end_to_end() {
    let app = spawn_app(Upstream::healthy()).await;
    let user = seed_user(&app, "boni1@example.com").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/user-faces", app.base))
        .multipart(register_form(user, true, png_bytes()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["face"]["is_primary"], json!(true));
    assert_eq!(body["face"]["embedding_dim"], json!(128));
    assert_eq!(body["face"]["embedding_model"], json!("ArcFace"));
    assert_eq!(
        body["face"]["image_hash"].as_str().map(str::len),
        Some(64),
        "sha-256 hex of the upload"
    );
    assert_eq!(stored_blobs(&app.blob_root), 1);

    let resp = client
        .post(format!("{}/face/verify", app.base))
        .multipart(verify_form(user))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "verified": true, "distance": 0.2 }));

    assert_eq!(app.hits(), vec!["embed".to_string(), "verify".to_string()]);
}

#[tokio::test]
async fn test_register_upstream_failure_relays_and_cleans_blob() {
    let app = spawn_app(Upstream::embed_failing(
        500,
        json!({ "detail": "model error" }),
    ))
    .await;
    let user = seed_user(&app, "farrel2@example.com").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/user-faces", app.base))
        .multipart(register_form(user, false, png_bytes()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500, "upstream status is relayed");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": false, "error": "model error" }));

    assert_eq!(stored_blobs(&app.blob_root), 0, "blob cleaned up");
    assert!(app.state.faces.list_for_user(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_missing_embedding_is_422() {
    let app = spawn_app(Upstream {
        embed_body: json!({ "ok": true }),
        ..Upstream::healthy()
    })
    .await;
    let user = seed_user(&app, "juan3@example.com").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/user-faces", app.base))
        .multipart(register_form(user, false, png_bytes()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    assert_eq!(stored_blobs(&app.blob_root), 0);
}

#[tokio::test]
async fn test_register_unknown_user_is_404() {
    let app = spawn_app(Upstream::healthy()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/user-faces", app.base))
        .multipart(register_form(999, false, png_bytes()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(stored_blobs(&app.blob_root), 0);
    assert!(app.hits().is_empty());
}

#[tokio::test]
async fn test_register_rejects_unsupported_image_type() {
    let app = spawn_app(Upstream::healthy()).await;
    let user = seed_user(&app, "diqi4@example.com").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/user-faces", app.base))
        .multipart(register_form(user, false, b"GIF89a not a face".to_vec()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(false));
    assert!(app.hits().is_empty());
}

#[tokio::test]
async fn test_primary_replacement_keeps_single_primary() {
    let app = spawn_app(Upstream::healthy()).await;
    let user = seed_user(&app, "juan5@example.com").await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let resp = client
            .post(format!("{}/user-faces", app.base))
            .multipart(register_form(user, true, png_bytes()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let faces = app.state.faces.list_for_user(user).await.unwrap();
    assert_eq!(faces.len(), 2);
    assert_eq!(faces.iter().filter(|f| f.is_primary).count(), 1);
    // list is newest-first; the replacement carries the flag now
    assert!(faces[0].is_primary);
}

#[tokio::test]
async fn test_verify_without_primary_is_404_and_skips_upstream() {
    let app = spawn_app(Upstream::healthy()).await;
    let user = seed_user(&app, "wildan6@example.com").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/face/verify", app.base))
        .multipart(verify_form(user))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(false));
    assert!(app.hits().is_empty(), "no upstream call may happen");
}

#[tokio::test]
async fn test_verify_with_url_reference_fetches_it() {
    let app = spawn_app(Upstream::healthy()).await;
    let user = seed_user(&app, "filah7@example.com").await;

    // Primary face whose reference lives behind an absolute URL.
    app.state
        .faces
        .create(NewUserFace {
            user_id: user,
            image_path: format!("{}/ref.jpg", app.upstream_base),
            image_hash: None,
            embedding: vec![0.1, 0.2],
            embedding_model: "ArcFace".to_string(),
            embedding_dim: Some(2),
            is_primary: true,
            metadata: FaceMetadata {
                disk: "local".to_string(),
                size: 0,
                mime: "image/jpeg".to_string(),
            },
        })
        .await
        .unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{}/face/verify", app.base))
        .multipart(verify_form(user))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(app.hits(), vec!["ref".to_string(), "verify".to_string()]);
}

#[tokio::test]
async fn test_verify_missing_blob_reference_is_404() {
    let app = spawn_app(Upstream::healthy()).await;
    let user = seed_user(&app, "fikri8@example.com").await;

    app.state
        .faces
        .create(NewUserFace {
            user_id: user,
            image_path: "user-faces/vanished.jpg".to_string(),
            image_hash: None,
            embedding: vec![0.1],
            embedding_model: "ArcFace".to_string(),
            embedding_dim: Some(1),
            is_primary: true,
            metadata: FaceMetadata {
                disk: "local".to_string(),
                size: 0,
                mime: "image/jpeg".to_string(),
            },
        })
        .await
        .unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{}/face/verify", app.base))
        .multipart(verify_form(user))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert!(app.hits().is_empty());
}

#[tokio::test]
async fn test_attendance_check_in_and_out() {
    let app = spawn_app(Upstream::healthy()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/attendances/check-in", app.base))
        .json(&json!({
            "user_id": 1,
            "date": "2026-08-06",
            "time": "08:01:00",
            "latitude": -6.2,
            "longitude": 106.8,
            "distance_m": 14.2,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["check_in"], json!("08:01:00"));

    let resp = client
        .post(format!("{}/attendances/check-out", app.base))
        .json(&json!({
            "user_id": 1,
            "date": "2026-08-06",
            "time": "17:00:00",
            "activity": "site survey",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["check_out"], json!("17:00:00"));

    let resp = client
        .post(format!("{}/attendances/check-out", app.base))
        .json(&json!({ "user_id": 1, "date": "2026-08-07", "time": "17:00:00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], json!("Attendance not found"));

    let resp = client
        .get(format!("{}/attendances?user_id=1", app.base))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = spawn_app(Upstream::healthy()).await;
    seed_user(&app, "boni9@example.com").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/auth/login", app.base))
        .json(&json!({ "email": "boni9@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/auth/login", app.base))
        .json(&json!({ "email": "boni9@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    let token = body["token"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/auth/logout", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Token is gone after revocation.
    let resp = client
        .post(format!("{}/auth/logout", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_health_probes() {
    let app = spawn_app(Upstream::healthy()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/healthz", app.base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/health/db", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true }));
}
