// SPDX-License-Identifier: MIT

//! User-credential refresh behavior around authenticated calls.

use axum::{body::Body, http::Request};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

use runbeats::session::{SessionRecord, UserTokens};

mod common;

fn record_with_expiry(expires_at: i64) -> SessionRecord {
    SessionRecord {
        user_id: Some(42),
        tokens: Some(UserTokens {
            access_token: "old_access".into(),
            refresh_token: "old_refresh".into(),
            expires_at,
        }),
        ..Default::default()
    }
}

async fn get(app: &axum::Router, uri: &str, sid: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("session-id", sid)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_expired_token_triggers_exactly_one_refresh() {
    let mock = common::spawn_mock_providers().await;
    *mock.state.activity_pages.lock().unwrap() = vec![5];
    let (app, state) = common::create_test_app(&mock).await;

    let expired = chrono::Utc::now().timestamp() - 1;
    state
        .sessions
        .save("sid", &record_with_expiry(expired))
        .await
        .unwrap();

    let response = get(&app, "/get_user_activity_data", "sid").await;
    let body = common::body_json(response).await;

    assert_eq!(body["error_status"], false);
    assert_eq!(mock.state.strava_refresh_calls.load(Ordering::SeqCst), 1);

    // the refreshed triple was written back before the provider call
    let record = state.sessions.load(Some("sid")).await;
    let tokens = record.tokens.unwrap();
    assert_eq!(tokens.access_token, "refreshed_access");
    assert_eq!(tokens.refresh_token, "refreshed_refresh");
    assert!(tokens.expires_at > chrono::Utc::now().timestamp());
}

#[tokio::test]
async fn test_valid_token_triggers_no_refresh() {
    let mock = common::spawn_mock_providers().await;
    *mock.state.activity_pages.lock().unwrap() = vec![5];
    let (app, state) = common::create_test_app(&mock).await;

    let valid = chrono::Utc::now().timestamp() + 3600;
    state
        .sessions
        .save("sid", &record_with_expiry(valid))
        .await
        .unwrap();

    get(&app, "/get_user_activity_data", "sid").await;
    assert_eq!(mock.state.strava_refresh_calls.load(Ordering::SeqCst), 0);

    // and the stored triple is untouched
    let record = state.sessions.load(Some("sid")).await;
    assert_eq!(record.tokens.unwrap().access_token, "old_access");
}

#[tokio::test]
async fn test_refresh_happens_once_across_paginated_fetch() {
    let mock = common::spawn_mock_providers().await;
    *mock.state.activity_pages.lock().unwrap() = vec![200, 200, 10];
    let (app, state) = common::create_test_app(&mock).await;

    let expired = chrono::Utc::now().timestamp() - 100;
    state
        .sessions
        .save("sid", &record_with_expiry(expired))
        .await
        .unwrap();

    get(&app, "/get_user_activity_data", "sid").await;

    // one refresh up front, then all three pages on the new token
    assert_eq!(mock.state.strava_refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.state.activity_list_calls.load(Ordering::SeqCst), 3);
}
