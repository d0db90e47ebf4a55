// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use codejar_tracker::config::Config;
use codejar_tracker::db::{FirestoreStore, MemoryStore};
use codejar_tracker::routes::create_router;
use codejar_tracker::AppState;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a Firestore store against the emulator.
pub async fn test_store() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over a fresh in-memory store.
/// Returns the router and the shared state.
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let (app, state, _) = create_test_app_with_store(Config::test_default());
    (app, state)
}

/// Like [`create_test_app`], also returning the store for fault injection.
pub fn create_test_app_with_store(config: Config) -> (Router, Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(config, store.clone()).expect("Failed to build state"));
    (create_router(state.clone()), state, store)
}

/// Distinct client address per call so per-address limits don't interfere.
pub fn unique_addr() -> String {
    static NEXT: AtomicU32 = AtomicU32::new(1);
    let n = NEXT.fetch_add(1, Ordering::SeqCst);
    format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff)
}

/// Unique email for test isolation.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", uuid::Uuid::new_v4())
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", unique_addr())
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and return status, headers and the JSON body (`Null` if empty).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

/// All `Set-Cookie` values of a response.
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

pub fn find_cookie(headers: &HeaderMap, name: &str) -> String {
    let cookies = set_cookies(headers);
    cookies
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {cookies:?}"))
}

/// Value part of a `Set-Cookie` header.
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, v)| v.to_string())
        .unwrap()
}

/// Register a local user and return `(access_token, refresh_token, body)`.
pub async fn register(app: &Router, email: &str) -> (String, String, Value) {
    let (status, _, body) = send(
        app,
        json_request(
            "POST",
            "/auth/register",
            serde_json::json!({ "name": "Test User", "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
        body,
    )
}

/// Save an entry with only a status.
pub async fn save_status(app: &Router, token: &str, date: &str, status: &str) -> Value {
    let (code, _, body) = send(
        app,
        bearer_request(
            "POST",
            "/tracker/entry",
            token,
            Some(serde_json::json!({ "date": date, "status": status })),
        ),
    )
    .await;
    assert_eq!(code, StatusCode::OK, "save failed: {body}");
    body
}

pub async fn get_tracker(app: &Router, token: &str) -> Value {
    let (code, _, body) = send(app, bearer_request("GET", "/tracker", token, None)).await;
    assert_eq!(code, StatusCode::OK, "get tracker failed: {body}");
    body
}
