// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use codejar_tracker::db::TrackerStore;
use serde_json::json;

mod common;
use common::{create_test_app, json_request, send, unique_email, PASSWORD};

/// Simultaneous registrations for one email: exactly one account is created.
#[tokio::test]
async fn test_concurrent_registration_race() {
    let (app, state) = create_test_app();
    let email = unique_email("race");

    let attempts: Vec<_> = (0..8)
        .map(|i| {
            let app = app.clone();
            let email = email.clone();
            tokio::spawn(async move {
                let (status, _, body) = send(
                    &app,
                    json_request(
                        "POST",
                        "/auth/register",
                        json!({ "name": format!("User {i}"), "email": email, "password": PASSWORD }),
                    ),
                )
                .await;
                (status, body)
            })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        let (status, body) = attempt.await.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => assert_eq!(body["error"], "email_registered"),
            other => panic!("unexpected status {other}: {body}"),
        }
    }
    assert_eq!(created, 1);
    assert!(state.store.find_user_by_email(&email).await.unwrap().is_some());
}

/// Concurrent writes to different users never cross over.
#[tokio::test]
async fn test_concurrent_saves_for_different_users() {
    let (app, _) = create_test_app();

    let users: Vec<_> = (0..4u64)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let (token, _, _) = common::register(&app, &unique_email(&format!("u{i}"))).await;
                for day in 1..=(i + 1) {
                    common::save_status(&app, &token, &format!("2024-02-{day:02}"), "done").await;
                }
                (i + 1, token)
            })
        })
        .collect();

    for user in users {
        let (expected, token) = user.await.unwrap();
        let tracker = common::get_tracker(&app, &token).await;
        assert_eq!(tracker["maxStreak"], expected);
        assert_eq!(tracker["entries"].as_object().unwrap().len() as u64, expected);
    }
}
