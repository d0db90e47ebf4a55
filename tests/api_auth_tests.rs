// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local account API tests: register, login, refresh and rate limits.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use codejar_tracker::db::TrackerStore;
use serde_json::json;

mod common;
use common::{
    create_test_app, cookie_value, find_cookie, json_request, register, send, unique_email,
    PASSWORD,
};

#[tokio::test]
async fn test_register_returns_tokens_user_and_cookies() {
    let (app, _) = create_test_app();
    let email = unique_email("reg");

    let (status, headers, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "name": "Ada", "email": email, "password": PASSWORD }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].is_string());
    assert!(body["refreshToken"].is_string());
    assert_eq!(body["user"]["email"], email);
    assert_eq!(body["user"]["user_name"], "Ada");
    assert_eq!(body["user"]["provider"], "local");
    assert!(body["user"].get("password_hash").is_none());

    let access = find_cookie(&headers, "token");
    let refresh = find_cookie(&headers, "refreshToken");
    assert_eq!(cookie_value(&access), body["token"].as_str().unwrap());
    assert_eq!(cookie_value(&refresh), body["refreshToken"].as_str().unwrap());
    assert!(access.contains("Max-Age=900"));
    assert!(refresh.contains("Max-Age=604800"));
}

#[tokio::test]
async fn test_register_accepts_user_name_field() {
    let (app, _) = create_test_app();
    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "user_name": "Bo", "email": unique_email("alias"), "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["user_name"], "Bo");
}

#[tokio::test]
async fn test_register_missing_fields() {
    let (app, _) = create_test_app();

    for payload in [
        json!({ "email": unique_email("m"), "password": PASSWORD }),
        json!({ "name": "A", "password": PASSWORD }),
        json!({ "name": "A", "email": unique_email("m") }),
        json!({}),
    ] {
        let (status, _, body) = send(&app, json_request("POST", "/auth/register", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("All fields are required"));
    }
}

#[tokio::test]
async fn test_register_rejects_blank_name() {
    let (app, state) = create_test_app();
    let email = unique_email("blank");

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "name": "   ", "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "All fields are required");
    assert!(state.store.find_user_by_email(&email).await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_rejects_malformed_json() {
    let (app, _) = create_test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", common::unique_addr())
        .body(Body::from("{not json"))
        .unwrap();

    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_register_duplicate_local_email() {
    let (app, _) = create_test_app();
    let email = unique_email("dup");
    register(&app, &email).await;

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "name": "Other", "email": email, "password": "another password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email_registered");
}

#[tokio::test]
async fn test_register_over_federated_email() {
    let (app, state) = create_test_app();
    let email = unique_email("fed");
    state
        .gateway
        .federated_sign_in("Fed User", &email)
        .await
        .unwrap();

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "name": "Local", "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email_federated");
    assert!(body["message"].as_str().unwrap().contains("Google"));
}

#[tokio::test]
async fn test_login_success_sets_cookies() {
    let (app, _) = create_test_app();
    let email = unique_email("login");
    register(&app, &email).await;

    let (status, headers, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            json!({ "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert!(body.get("refreshToken").is_none());
    assert_eq!(body["user"]["email"], email);
    find_cookie(&headers, "token");
    find_cookie(&headers, "refreshToken");
}

#[tokio::test]
async fn test_login_failures() {
    let (app, state) = create_test_app();
    let email = unique_email("lf");
    register(&app, &email).await;
    let federated = unique_email("lf-fed");
    state
        .gateway
        .federated_sign_in("Fed", &federated)
        .await
        .unwrap();

    let cases = [
        (json!({ "email": email, "password": "wrong" }), StatusCode::UNAUTHORIZED, "invalid_credentials"),
        (json!({ "email": unique_email("nobody"), "password": PASSWORD }), StatusCode::NOT_FOUND, "not_found"),
        (json!({ "email": federated, "password": PASSWORD }), StatusCode::UNAUTHORIZED, "federated_only"),
        (json!({ "email": email }), StatusCode::BAD_REQUEST, "bad_request"),
    ];

    for (payload, expected_status, expected_code) in cases {
        let (status, _, body) = send(&app, json_request("POST", "/auth/login", payload)).await;
        assert_eq!(status, expected_status, "{body}");
        assert_eq!(body["error"], expected_code);
    }
}

#[tokio::test]
async fn test_refresh_from_body_and_cookie() {
    let (app, state) = create_test_app();
    let (_, refresh, body) = register(&app, &unique_email("refresh")).await;
    let user_id = body["user"]["user_id"].as_str().unwrap().to_string();

    let (status, headers, body) = send(
        &app,
        json_request("POST", "/auth/refresh", json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();
    assert_eq!(cookie_value(&find_cookie(&headers, "token")), token);
    let claims = state
        .tokens
        .verify(token, codejar_tracker::services::TokenKind::Access)
        .unwrap();
    assert_eq!(claims.sub, user_id);

    let request = Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header(header::COOKIE, format!("refreshToken={refresh}"))
        .header("x-forwarded-for", common::unique_addr())
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_refresh_failures() {
    let (app, state) = create_test_app();
    let (access, _, _) = register(&app, &unique_email("rf")).await;
    let ghost = state.tokens.issue_refresh("ghost-user", "ghost@example.com").unwrap();

    let cases = [
        (json!({}), StatusCode::BAD_REQUEST, "missing_token"),
        (json!({ "refreshToken": "garbage" }), StatusCode::UNAUTHORIZED, "invalid_token"),
        // An access token is not a refresh token.
        (json!({ "refreshToken": access }), StatusCode::UNAUTHORIZED, "invalid_token"),
        (json!({ "refreshToken": ghost }), StatusCode::NOT_FOUND, "user_not_found"),
    ];

    for (payload, expected_status, expected_code) in cases {
        let (status, _, body) = send(&app, json_request("POST", "/auth/refresh", payload)).await;
        assert_eq!(status, expected_status, "{body}");
        assert_eq!(body["error"], expected_code);
    }
}

#[tokio::test]
async fn test_register_rate_limited_per_address() {
    let (app, _) = create_test_app();

    let attempt = |email: String| {
        Request::builder()
            .method("POST")
            .uri("/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::from(
                json!({ "name": "R", "email": email, "password": PASSWORD }).to_string(),
            ))
            .unwrap()
    };

    for _ in 0..3 {
        let (status, _, _) = send(&app, attempt(unique_email("rl"))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, headers, body) = send(&app, attempt(unique_email("rl"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");
    let retry_after: u64 = headers
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 3600);

    // Another address is unaffected.
    register(&app, &unique_email("rl-other")).await;
}

#[tokio::test]
async fn test_login_rate_limit_counts_failures() {
    let (app, _) = create_test_app();
    let email = unique_email("lrl");
    register(&app, &email).await;

    let attempt = || {
        Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.51")
            .body(Body::from(
                json!({ "email": email, "password": "wrong" }).to_string(),
            ))
            .unwrap()
    };

    for _ in 0..5 {
        let (status, _, _) = send(&app, attempt()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _, _) = send(&app, attempt()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
