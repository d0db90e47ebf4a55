// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Google sign-in redirect and OAuth state tests.
//!
//! These tests verify that frontend URLs survive the signed state
//! parameter and that the callback always lands on the frontend.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use codejar_tracker::config::{Config, GoogleOAuthConfig};
use codejar_tracker::services::google_signin::{sign_state, verify_state, NONCE_COOKIE};
use std::time::SystemTime;

mod common;
use common::{
    cookie_value, create_test_app, create_test_app_with_store, find_cookie, send, set_cookies,
};

fn google_config() -> Config {
    let mut config = Config::test_default();
    config.google = Some(GoogleOAuthConfig {
        client_id: "client-123.apps.googleusercontent.com".to_string(),
        client_secret: "secret".to_string(),
    });
    config
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn location(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| urlencoding::decode(v).unwrap().into_owned())
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn has_session_cookie(headers: &axum::http::HeaderMap) -> bool {
    set_cookies(headers)
        .iter()
        .any(|c| c.starts_with("session=") && !c.starts_with("session=;"))
}

/// Start sign-in and return `(state, nonce)` as the browser would hold them.
async fn start_sign_in(app: &axum::Router, uri: &str) -> (String, String) {
    let (_, headers, _) = send(app, get(uri)).await;
    let oauth_state = query_param(&location(&headers), "state").unwrap();
    let nonce = cookie_value(&find_cookie(&headers, NONCE_COOKIE));
    (oauth_state, nonce)
}

#[test]
fn test_oauth_state_roundtrip_production() {
    let frontend_url = "https://codejar.example.com";
    let now = SystemTime::now();
    let state = sign_state(frontend_url, "n1", b"key", now).unwrap();
    assert_eq!(
        verify_state(&state, "n1", b"key", now).as_deref(),
        Some(frontend_url)
    );
}

#[test]
fn test_oauth_state_base64_url_safe() {
    let state = sign_state("https://example.com/a/b?c=d", "n1", b"key", SystemTime::now()).unwrap();
    assert!(!state.contains('+'), "State should not contain '+'");
    assert!(!state.contains('/'), "State should not contain '/'");
    assert!(!state.contains('='), "State should not contain '=' padding");
}

#[test]
fn test_oauth_state_tampered_url_rejected() {
    let now = SystemTime::now();
    let state = sign_state("https://codejar.example.com", "n1", b"key", now).unwrap();
    let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();
    let forged = URL_SAFE_NO_PAD.encode(decoded.replace("codejar.example.com", "evil.example"));
    assert_eq!(verify_state(&forged, "n1", b"key", now), None);
}

#[tokio::test]
async fn test_google_start_redirects_with_signed_state() {
    let (app, state, _) = create_test_app_with_store(google_config());

    let (status, headers, _) = send(&app, get("/auth/google")).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);

    let target = location(&headers);
    assert!(target.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert_eq!(
        query_param(&target, "client_id").as_deref(),
        Some("client-123.apps.googleusercontent.com")
    );
    assert_eq!(
        query_param(&target, "redirect_uri").as_deref(),
        Some("http://localhost:8080/auth/google/callback")
    );

    let nonce_cookie = find_cookie(&headers, NONCE_COOKIE);
    assert!(nonce_cookie.contains("HttpOnly"));
    assert!(nonce_cookie.contains("Path=/auth/google"));

    let oauth_state = query_param(&target, "state").unwrap();
    let nonce = cookie_value(&nonce_cookie);
    assert_eq!(
        verify_state(&oauth_state, &nonce, &state.config.oauth_state_key, SystemTime::now())
            .as_deref(),
        Some("http://localhost:5173")
    );
}

#[tokio::test]
async fn test_google_start_ignores_foreign_redirect() {
    let (app, state, _) = create_test_app_with_store(google_config());
    let key = &state.config.oauth_state_key;

    let (oauth_state, nonce) =
        start_sign_in(&app, "/auth/google?redirect_uri=https%3A%2F%2Fevil.example%2F").await;
    assert_eq!(
        verify_state(&oauth_state, &nonce, key, SystemTime::now()).as_deref(),
        Some("http://localhost:5173")
    );

    let (oauth_state, nonce) = start_sign_in(
        &app,
        "/auth/google?redirect_uri=http%3A%2F%2Flocalhost%3A5173%2Ftracker",
    )
    .await;
    assert_eq!(
        verify_state(&oauth_state, &nonce, key, SystemTime::now()).as_deref(),
        Some("http://localhost:5173/tracker")
    );
}

#[tokio::test]
async fn test_google_callback_error_returns_to_frontend() {
    let (app, _, _) = create_test_app_with_store(google_config());
    let (oauth_state, nonce) = start_sign_in(
        &app,
        "/auth/google?redirect_uri=http%3A%2F%2Flocalhost%3A5173%2Ftracker",
    )
    .await;

    let (status, headers, _) = send(
        &app,
        get_with_cookie(
            &format!("/auth/google/callback?error=access_denied&state={oauth_state}"),
            &format!("{NONCE_COOKIE}={nonce}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&headers),
        "http://localhost:5173/tracker?error=access_denied"
    );
    assert!(!has_session_cookie(&headers));
}

#[tokio::test]
async fn test_google_callback_forged_state_rejects_code() {
    let (app, _, _) = create_test_app_with_store(google_config());

    let (status, headers, _) = send(
        &app,
        get("/auth/google/callback?state=forged&code=attacker-code"),
    )
    .await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&headers), "http://localhost:5173?error=invalid_state");
    assert!(!has_session_cookie(&headers));
}

/// A valid state minted for another browser must not sign this one in.
#[tokio::test]
async fn test_google_callback_requires_matching_nonce_cookie() {
    let (app, _, _) = create_test_app_with_store(google_config());
    let (oauth_state, nonce) = start_sign_in(&app, "/auth/google").await;
    let uri = format!("/auth/google/callback?state={oauth_state}&code=attacker-code");

    for request in [
        get(&uri),
        get_with_cookie(&uri, &format!("{NONCE_COOKIE}=someone-else")),
    ] {
        let (status, headers, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&headers), "http://localhost:5173?error=invalid_state");
        assert!(!has_session_cookie(&headers));
    }

    // The matching browser gets past the state check (the code exchange
    // itself then fails without a reachable Google).
    let (_, headers, _) = send(
        &app,
        get_with_cookie(
            &format!("/auth/google/callback?state={oauth_state}"),
            &format!("{NONCE_COOKIE}={nonce}"),
        ),
    )
    .await;
    assert_eq!(location(&headers), "http://localhost:5173?error=missing_code");
}

#[tokio::test]
async fn test_google_callback_clears_nonce_cookie() {
    let (app, _, _) = create_test_app_with_store(google_config());

    let (_, headers, _) = send(&app, get("/auth/google/callback?state=forged")).await;
    let cleared = find_cookie(&headers, NONCE_COOKIE);
    assert!(cleared.contains("Max-Age=0"));
    assert!(cleared.contains("Path=/auth/google"));
}

#[tokio::test]
async fn test_google_routes_disabled_without_credentials() {
    let (app, _) = create_test_app();
    for uri in ["/auth/google", "/auth/google/callback?code=x&state=y"] {
        let (status, _, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"], "not_found");
    }
}
