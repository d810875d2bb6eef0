//! HTTP API tests
//!
//! Drive the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tessera_core::{
    AccessPolicy, AssetLocator, InMemoryIssuerDirectory, InMemoryResourceCatalog, IssuerId,
    ManualClock, ResourceKind, ResourceMetadata, ResourceRef, SignedUrlMinter,
};
use tessera_server::config::{IssuerEntry, ResourceEntry};
use tessera_server::{AppState, ServerConfig, create_router};
use tessera_service::AccessService;
use tower::ServiceExt;

const CLINIC_KEY: &str = "clinic-7-secret-key";
const OTHER_KEY: &str = "clinic-8-secret-key";
const SIGNING_KEY: &str = "0707070707070707070707070707070707070707070707070707070707070707";
const ASSET_BASE: &str = "https://assets.example.test";

fn test_config() -> ServerConfig {
    ServerConfig {
        signing_key_hex: SIGNING_KEY.to_string(),
        asset_base_url: ASSET_BASE.to_string(),
        issuers: vec![
            IssuerEntry {
                api_key: CLINIC_KEY.to_string(),
                issuer_id: "clinic-7".to_string(),
            },
            IssuerEntry {
                api_key: OTHER_KEY.to_string(),
                issuer_id: "clinic-8".to_string(),
            },
        ],
        resources: vec![
            ResourceEntry {
                kind: ResourceKind::KnowledgeResource,
                id: "kr-video".to_string(),
                title: "Intro lecture".to_string(),
                description: None,
                link_url: None,
                asset: Some(AssetLocator {
                    bucket: "media".to_string(),
                    key: "lectures/intro.mp4".to_string(),
                    content_type: "video/mp4".to_string(),
                }),
            },
            ResourceEntry {
                kind: ResourceKind::InfoLink,
                id: "il-faq".to_string(),
                title: "FAQ".to_string(),
                description: Some("Common questions".to_string()),
                link_url: Some("https://example.test/faq".to_string()),
                asset: None,
            },
        ],
        ..ServerConfig::default()
    }
}

fn create_test_app() -> Router {
    let config = test_config();
    config.validate().unwrap();
    create_router(Arc::new(AppState::from_config(&config).unwrap()))
}

/// App on a manual clock, for expiry tests
fn create_clocked_app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));

    let catalog = InMemoryResourceCatalog::new();
    catalog.insert(
        ResourceRef::info_link("il-faq"),
        ResourceMetadata {
            title: "FAQ".to_string(),
            description: None,
            link_url: Some("https://example.test/faq".to_string()),
            asset: None,
        },
    );
    let issuers = InMemoryIssuerDirectory::new();
    issuers.register(CLINIC_KEY, IssuerId::new("clinic-7"));

    let service = AccessService::in_memory(
        Arc::new(catalog),
        Arc::new(SignedUrlMinter::from_hex(ASSET_BASE, SIGNING_KEY).unwrap()),
        AccessPolicy::default(),
    )
    .with_clock(clock.clone());

    let state = AppState::new(Arc::new(service), Arc::new(issuers));
    (create_router(Arc::new(state)), clock)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

fn issue_body(kind: &str, id: &str, hours: u32, max_sessions: u32) -> Value {
    json!({
        "resource": { "kind": kind, "id": id },
        "validityWindowHours": hours,
        "maxSessions": max_sessions,
    })
}

async fn issue(app: &Router, hours: u32, max_sessions: u32) -> Value {
    let (status, body) = send(
        app,
        post_json(
            "/v1/codes",
            Some(CLINIC_KEY),
            issue_body("knowledge_resource", "kr-video", hours, max_sessions),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn redeem(app: &Router, code: &str) -> (StatusCode, Value) {
    send(app, post_json("/v1/redeem", None, json!({ "code": code }))).await
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap()
}

// ============================================================================
// Health & Auth
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let (status, body) = send(&app, get("/health", &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_issue_requires_bearer_key() {
    let app = create_test_app();
    let body = issue_body("knowledge_resource", "kr-video", 24, 1);

    let (status, response) = send(&app, post_json("/v1/codes", None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response), "UNAUTHORIZED");

    let (status, _) = send(
        &app,
        post_json("/v1/codes", Some("not-a-registered-key"), body),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Issue / Redeem / Content
// ============================================================================

#[tokio::test]
async fn test_issue_redeem_fetch_flow() {
    let app = create_test_app();
    let issued = issue(&app, 24, 2).await;
    let code = issued["code"].as_str().unwrap();
    assert!(issued["id"].is_string());
    assert!(issued["ceilingExpiresAt"].is_string());

    let (status, redemption) = redeem(&app, code).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(redemption["contentRef"]["resource"]["kind"], "knowledge_resource");
    assert_eq!(redemption["contentRef"]["title"], "Intro lecture");
    assert!(redemption["remainingSeconds"].as_i64().unwrap() > 0);
    let token = redemption["sessionToken"].as_str().unwrap();

    let (status, content) = send(&app, get("/v1/content", &[("x-session-token", token)])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content["title"], "Intro lecture");
    assert_eq!(content["asset"]["contentType"], "video/mp4");
    assert!(
        content["asset"]["url"]
            .as_str()
            .unwrap()
            .starts_with(ASSET_BASE)
    );
    assert_eq!(content["sessionExpiresAt"], redemption["expiresAt"]);
}

#[tokio::test]
async fn test_info_link_content_has_no_asset() {
    let app = create_test_app();
    let (_, issued) = send(
        &app,
        post_json(
            "/v1/codes",
            Some(CLINIC_KEY),
            issue_body("info_link", "il-faq", 24, 1),
        ),
    )
    .await;

    let (_, redemption) = redeem(&app, issued["code"].as_str().unwrap()).await;
    let token = redemption["sessionToken"].as_str().unwrap();

    let (status, content) = send(&app, get("/v1/content", &[("x-session-token", token)])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content["linkUrl"], "https://example.test/faq");
    assert!(content["asset"].is_null());
}

#[tokio::test]
async fn test_exhausted_code_is_forbidden() {
    let app = create_test_app();
    let issued = issue(&app, 24, 1).await;
    let code = issued["code"].as_str().unwrap();

    assert_eq!(redeem(&app, code).await.0, StatusCode::OK);

    let (status, body) = redeem(&app, code).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "EXHAUSTED");
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let app = create_test_app();
    let (status, body) = redeem(&app, "ZZZZ-ZZZZ-ZZZZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn test_redeem_accepts_device_fingerprint() {
    let app = create_test_app();
    let issued = issue(&app, 24, 1).await;

    let (status, _) = send(
        &app,
        post_json(
            "/v1/redeem",
            None,
            json!({ "code": issued["code"], "deviceFingerprint": "device-a" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = create_test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/redeem")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_issue_request() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        post_json(
            "/v1/codes",
            Some(CLINIC_KEY),
            issue_body("knowledge_resource", "kr-video", 0, 1),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_REQUEST");
}

#[tokio::test]
async fn test_content_requires_session_token() {
    let app = create_test_app();

    let (status, body) = send(&app, get("/v1/content", &[])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "SESSION_NOT_FOUND");

    let (status, _) = send(&app, get("/v1/content", &[("x-session-token", "bogus")])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Issuer Operations
// ============================================================================

#[tokio::test]
async fn test_code_status_for_owner_only() {
    let app = create_test_app();
    let issued = issue(&app, 24, 3).await;
    redeem(&app, issued["code"].as_str().unwrap()).await;

    let uri = format!("/v1/codes/{}", issued["id"].as_str().unwrap());
    let bearer = format!("Bearer {CLINIC_KEY}");
    let (status, body) = send(&app, get(&uri, &[("authorization", bearer.as_str())])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["usedSessions"], 1);
    assert_eq!(body["maxSessions"], 3);
    assert_eq!(body["sessions"], 1);

    let other = format!("Bearer {OTHER_KEY}");
    let (status, body) = send(&app, get(&uri, &[("authorization", other.as_str())])).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");
}

#[tokio::test]
async fn test_malformed_code_id_is_not_found() {
    let app = create_test_app();
    let bearer = format!("Bearer {CLINIC_KEY}");
    let (status, _) = send(
        &app,
        get("/v1/codes/not-a-uuid", &[("authorization", bearer.as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalidate_blocks_redemption() {
    let app = create_test_app();
    let issued = issue(&app, 24, 5).await;
    let code = issued["code"].as_str().unwrap();
    let uri = format!("/v1/codes/{}/invalidate", issued["id"].as_str().unwrap());

    let (status, _) = send(&app, post_json(&uri, Some(OTHER_KEY), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, post_json(&uri, Some(CLINIC_KEY), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = redeem(&app, code).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "INVALIDATED");
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
async fn test_expired_session_and_code() {
    let (app, clock) = create_clocked_app();
    let (status, issued) = send(
        &app,
        post_json(
            "/v1/codes",
            Some(CLINIC_KEY),
            issue_body("info_link", "il-faq", 2, 5),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let code = issued["code"].as_str().unwrap();

    let (_, redemption) = redeem(&app, code).await;
    let token = redemption["sessionToken"].as_str().unwrap();

    clock.advance(Duration::hours(2));

    let (status, body) = send(&app, get("/v1/content", &[("x-session-token", token)])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "SESSION_EXPIRED");

    let (status, body) = redeem(&app, code).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "EXPIRED");
}

// ============================================================================
// Persistent Backend
// ============================================================================

#[tokio::test]
async fn test_redb_backend_serves_requests() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config().with_db(temp_dir.path().join("server.redb"));
    let app = create_router(Arc::new(AppState::from_config(&config).unwrap()));

    let issued = issue(&app, 24, 1).await;
    let (status, _) = redeem(&app, issued["code"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(temp_dir.path().join("server.redb").exists());
}
