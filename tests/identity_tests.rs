// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential resolution through the protected routes.
//!
//! Federated session cookie first, then the access-token cookie, then the
//! bearer header. The first credential that names an existing user wins.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use codejar_tracker::config::Config;
use std::time::Duration;

mod common;
use common::{bearer_request, create_test_app, create_test_app_with_store, register, send, unique_email};

fn profile_with_cookie(cookie: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri("/user/profile")
        .header(header::COOKIE, cookie);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_profile_with_bearer() {
    let (app, _) = create_test_app();
    let email = unique_email("profile");
    let (token, _, body) = register(&app, &email).await;

    let (status, _, profile) = send(&app, bearer_request("GET", "/user/profile", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], body["user"]["user_id"]);
    assert_eq!(profile["name"], "Test User");
    assert_eq!(profile["email"], email);
    assert_eq!(profile["provider"], "local");
    assert!(profile["createdAt"].is_string());
    assert!(profile.get("password_hash").is_none());
}

#[tokio::test]
async fn test_no_credentials_is_unauthorized() {
    let (app, _) = create_test_app();
    let request = Request::builder()
        .uri("/tracker")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_access_cookie_beats_bearer() {
    let (app, _) = create_test_app();
    let cookie_email = unique_email("cookie");
    let bearer_email = unique_email("bearer");
    let (cookie_token, _, _) = register(&app, &cookie_email).await;
    let (bearer_token, _, _) = register(&app, &bearer_email).await;

    let (status, _, profile) = send(
        &app,
        profile_with_cookie(&format!("token={cookie_token}"), Some(&bearer_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], cookie_email);
}

#[tokio::test]
async fn test_federated_session_beats_local_tokens() {
    let (app, state) = create_test_app();
    let fed_email = unique_email("fed");
    let local_email = unique_email("local");
    let session = state
        .gateway
        .federated_sign_in("Fed User", &fed_email)
        .await
        .unwrap();
    let (local_token, _, _) = register(&app, &local_email).await;

    let (status, _, profile) = send(
        &app,
        profile_with_cookie(
            &format!("session={}; token={local_token}", session.session_token),
            Some(&local_token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], fed_email);
    assert_eq!(profile["provider"], "federated");
}

#[tokio::test]
async fn test_invalid_credentials_fall_through() {
    let (app, _) = create_test_app();
    let email = unique_email("through");
    let (token, _, _) = register(&app, &email).await;

    let (status, _, profile) = send(
        &app,
        profile_with_cookie("session=forged; token=also-forged", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], email);
}

#[tokio::test]
async fn test_token_kinds_are_not_interchangeable() {
    let (app, state) = create_test_app();
    let email = unique_email("kinds");
    let (_, refresh, body) = register(&app, &email).await;
    let user_id = body["user"]["user_id"].as_str().unwrap();

    // A refresh token is not an access token.
    let (status, _, _) = send(&app, bearer_request("GET", "/tracker", &refresh, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // An access token in the session cookie is not a federated session.
    let access = state.tokens.issue_access(user_id, &email).unwrap();
    let (status, _, _) = send(&app, profile_with_cookie(&format!("session={access}"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verified_token_for_missing_user_is_unauthorized() {
    let (app, state) = create_test_app();
    let token = state
        .tokens
        .issue_access("ghost", "ghost@example.com")
        .unwrap();

    let (status, _, _) = send(&app, bearer_request("GET", "/tracker", &token, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_slow_store_is_unavailable_not_unauthorized() {
    let mut config = Config::test_default();
    config.store_timeout = Duration::from_millis(50);
    let (app, state, store) = create_test_app_with_store(config);
    let email = unique_email("slow");
    let session = state
        .gateway
        .federated_sign_in("Slow", &email)
        .await
        .unwrap();

    store.set_latency(Duration::from_millis(500));
    let (status, headers, body) = send(
        &app,
        profile_with_cookie(&format!("session={}", session.session_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "unavailable");
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
}

#[tokio::test]
async fn test_security_headers_on_error_responses() {
    let (app, _) = create_test_app();
    let request = Request::builder()
        .uri("/user/profile")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = create_test_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
