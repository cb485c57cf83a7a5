// SPDX-License-Identifier: MIT

//! Login, auth-status, account-linking and logout routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::SessionId;
use crate::session::{SessionRecord, UserTokens};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/callback", get(auth_callback))
        .route("/authentication_status", get(authentication_status))
        .route("/retrieve_lastfm", get(link_lastfm))
        .route("/logout", get(logout))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// Exchange a Strava authorization code for a credential triple and
/// create a session. If the caller already has a live session the
/// exchange is skipped and the stored profile is returned.
///
/// Failures answer `{"error": true}` so the frontend can send the user
/// back through the connect flow.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
    Query(params): Query<CallbackParams>,
) -> Json<Value> {
    let record = state.sessions.load(session_id.as_deref()).await;

    if record.is_authenticated() {
        return Json(json!({
            "error": false,
            "user_data": record.athlete_info,
        }));
    }

    match login(&state, params.code.as_deref()).await {
        Ok((new_session_id, athlete)) => Json(json!({
            "error": false,
            "session_id": new_session_id,
            "user_data": athlete,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Login code exchange failed");
            Json(json!({"error": true}))
        }
    }
}

/// Perform the code exchange and persist the fresh session record.
async fn login(state: &AppState, code: Option<&str>) -> Result<(String, Value)> {
    let code = code.ok_or_else(|| AppError::Upstream("Missing authorization code".to_string()))?;

    let exchange = state.strava.exchange_code(code).await?;

    let user_id = exchange
        .athlete
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| AppError::Upstream("Exchange response missing athlete id".to_string()))?;

    let record = SessionRecord {
        user_id: Some(user_id),
        athlete_info: Some(exchange.athlete.clone()),
        tokens: Some(UserTokens {
            access_token: exchange.access_token,
            refresh_token: exchange.refresh_token,
            expires_at: exchange.expires_at,
        }),
        ..Default::default()
    };

    let new_session_id = state.sessions.new_session_id()?;
    state.sessions.save(&new_session_id, &record).await?;

    tracing::info!(user_id, "Session created");
    Ok((new_session_id, exchange.athlete))
}

/// Whether the caller holds a live session, and whether a Last.fm
/// account is linked to it.
async fn authentication_status(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
) -> Json<Value> {
    let record = state.sessions.load(session_id.as_deref()).await;

    if !record.is_authenticated() {
        return Json(json!({"result": false, "last_fm_status": false}));
    }

    Json(json!({
        "result": true,
        "last_fm_status": record.last_fm_username.is_some(),
    }))
}

#[derive(Deserialize)]
struct LinkLastFmParams {
    username: Option<String>,
}

/// Link a Last.fm account to the session, after checking upstream that
/// the account actually exists.
async fn link_lastfm(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
    Query(params): Query<LinkLastFmParams>,
) -> Json<Value> {
    let result = async {
        let sid = session_id
            .as_deref()
            .ok_or_else(|| AppError::Store("No session to link against".to_string()))?;
        let username = params
            .username
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Missing username".to_string()))?;

        state.lastfm.verify_user(username).await?;

        let mut record = state.sessions.load(Some(sid)).await;
        record.last_fm_username = Some(username.to_string());
        state.sessions.save(sid, &record).await
    }
    .await;

    match result {
        Ok(()) => Json(json!({"error": false})),
        Err(e) => {
            tracing::warn!(error = %e, "Last.fm account linking failed");
            Json(json!({"error": true}))
        }
    }
}

/// Delete the server-side session.
async fn logout(State(state): State<Arc<AppState>>, session_id: SessionId) -> Json<Value> {
    if let Some(sid) = session_id.as_deref() {
        if let Err(e) = state.sessions.delete(sid).await {
            tracing::warn!(error = %e, "Session deletion failed");
        }
    }

    Json(json!({"logout-status": true}))
}
