// SPDX-License-Identifier: MIT

//! Authenticated data routes: activity history, per-activity detail and
//! streams, listening correlation, and catalog cross-reference.
//!
//! Every handler follows the same shape: load the session, reject with
//! 401 before touching any provider if it is unauthenticated, serve from
//! the per-session cache when possible, and write the full record back
//! after any mutation.

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
use crate::services::correlate;
use crate::services::credentials;
use crate::services::strava::{filter_runs, ActivityFilter};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get_user_activity_data", get(get_user_activity_data))
        .route("/get_user_profile_data", get(get_user_profile_data))
        .route("/get_activity_strava_data", get(get_activity_strava_data))
        .route("/get_activity_music_data", get(get_activity_music_data))
        .route("/get_music_artist_data", get(get_music_artist_data))
}

#[derive(Deserialize)]
struct ActivityListQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

/// The athlete's running history.
///
/// Full-history results (no date filter) are cached in the session and
/// served from there on repeat calls. Date-filtered calls always go
/// upstream and never touch the cache.
async fn get_user_activity_data(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
    Query(params): Query<ActivityListQuery>,
) -> Result<Json<Value>> {
    let mut record = state.sessions.load(session_id.as_deref()).await;
    if !record.is_authenticated() {
        return Err(AppError::Unauthorized);
    }
    let sid = session_id.as_deref().ok_or(AppError::Unauthorized)?;

    let filter = ActivityFilter {
        start_date: params.start_date,
        end_date: params.end_date,
    };

    if filter.is_empty() {
        if let Some(runs) = &record.run_activities {
            return Ok(Json(json!({
                "error_status": false,
                "athlete_running_data": runs,
            })));
        }
    }

    let access_token =
        credentials::ensure_user_token(&state.strava, &state.sessions, sid, &mut record).await?;

    let activities = state
        .strava
        .fetch_all_activities(&access_token, &filter)
        .await?;
    let runs = filter_runs(activities);

    if filter.is_empty() {
        record.run_activities = Some(runs.clone());
        state.sessions.save(sid, &record).await?;
    }

    Ok(Json(json!({
        "error_status": false,
        "athlete_running_data": runs,
    })))
}

/// The athlete's profile, fetched live from Strava.
async fn get_user_profile_data(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
) -> Result<Json<Value>> {
    let mut record = state.sessions.load(session_id.as_deref()).await;
    if !record.is_authenticated() {
        return Err(AppError::Unauthorized);
    }
    let sid = session_id.as_deref().ok_or(AppError::Unauthorized)?;

    let access_token =
        credentials::ensure_user_token(&state.strava, &state.sessions, sid, &mut record).await?;
    let athlete = state.strava.get_athlete(&access_token).await?;

    Ok(Json(json!({
        "error_status": false,
        "athlete_data": athlete,
    })))
}

#[derive(Deserialize)]
struct ActivityQuery {
    activity_id: Option<String>,
}

impl ActivityQuery {
    fn id(&self) -> Result<&str> {
        self.activity_id
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Missing activity_id".to_string()))
    }
}

/// Detail plus velocity/location streams for one activity, both cached
/// per activity id.
async fn get_activity_strava_data(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
    Query(params): Query<ActivityQuery>,
) -> Result<Json<Value>> {
    let mut record = state.sessions.load(session_id.as_deref()).await;
    if !record.is_authenticated() {
        return Err(AppError::Unauthorized);
    }
    let sid = session_id.as_deref().ok_or(AppError::Unauthorized)?;
    let activity_id = params.id()?.to_string();

    let detail = correlate::activity_detail(
        &state.strava,
        &state.sessions,
        sid,
        &mut record,
        &activity_id,
    )
    .await?;

    let streams = match record.activity(&activity_id).and_then(|a| a.streams.clone()) {
        Some(streams) => streams,
        None => {
            let access_token =
                credentials::ensure_user_token(&state.strava, &state.sessions, sid, &mut record)
                    .await?;
            let streams = state
                .strava
                .get_activity_streams(&access_token, &activity_id)
                .await?;
            record.activity_mut(&activity_id).streams = Some(streams.clone());
            state.sessions.save(sid, &record).await?;
            streams
        }
    };

    Ok(Json(json!({
        "error_status": false,
        "activity_data": detail,
        "activity_streams": streams,
    })))
}

/// Tracks the user listened to during one activity, with the activity's
/// listening window.
async fn get_activity_music_data(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
    Query(params): Query<ActivityQuery>,
) -> Result<Json<Value>> {
    let mut record = state.sessions.load(session_id.as_deref()).await;
    if !record.is_authenticated() {
        return Err(AppError::Unauthorized);
    }
    let sid = session_id.as_deref().ok_or(AppError::Unauthorized)?;
    let activity_id = params.id()?.to_string();

    let detail = correlate::activity_detail(
        &state.strava,
        &state.sessions,
        sid,
        &mut record,
        &activity_id,
    )
    .await?;
    let (start_time, end_time) = correlate::activity_window(&detail)?;

    let music = correlate::music_for_activity(
        &state.lastfm,
        &state.sessions,
        sid,
        &mut record,
        &activity_id,
        (start_time, end_time),
    )
    .await?;

    Ok(Json(json!({
        "music_data": music,
        "activity_times": {"startTime": start_time, "endTime": end_time},
    })))
}

/// Per-track catalog cross-reference for one activity: artist info, top
/// tracks, and recommendations.
async fn get_music_artist_data(
    State(state): State<Arc<AppState>>,
    session_id: SessionId,
    Query(params): Query<ActivityQuery>,
) -> Result<Json<Value>> {
    let mut record = state.sessions.load(session_id.as_deref()).await;
    if !record.is_authenticated() {
        return Err(AppError::Unauthorized);
    }
    let sid = session_id.as_deref().ok_or(AppError::Unauthorized)?;
    let activity_id = params.id()?.to_string();

    let results = correlate::crossref_for_activity(
        &state.spotify,
        &state.sessions,
        sid,
        &mut record,
        &activity_id,
    )
    .await?;

    Ok(Json(json!(results)))
}
