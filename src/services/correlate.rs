// SPDX-License-Identifier: MIT

//! Activity/music cross-reference pipeline.
//!
//! The dependency chain runs: activity detail → listening window →
//! track list with duration enrichment → per-track catalog
//! cross-reference. Every step short-circuits to the per-activity cache
//! in the session record when its output is already present, and writes
//! its output back through the session manager otherwise. A failure
//! mid-pipeline aborts the request but leaves prior steps' caches
//! durable, so a retry resumes where it left off.

use chrono::DateTime;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::session::{SessionRecord, Sessions};
use crate::services::credentials;
use crate::services::lastfm::LastFmClient;
use crate::services::spotify::{first_image_url, SpotifyClient};
use crate::services::strava::StravaClient;

/// Lead buffer before activity start, to catch a track that started just
/// before the run did.
const LISTEN_BUFFER_SECS: i64 = 5 * 60;

/// How many recommendation candidates to request per seed.
const RECOMMENDATION_FETCH_LIMIT: u32 = 15;

/// Upper bound on recommendations kept after filtering.
const RECOMMENDATION_MAX: usize = 10;

/// Market restriction for top-track lookups.
const TOP_TRACKS_MARKET: &str = "GB";

/// Step 1: activity detail, cached under the activity id.
pub async fn activity_detail(
    strava: &StravaClient,
    sessions: &Sessions,
    session_id: &str,
    record: &mut SessionRecord,
    activity_id: &str,
) -> Result<Value, AppError> {
    if let Some(detail) = record.activity(activity_id).and_then(|a| a.detail.clone()) {
        return Ok(detail);
    }

    let access_token =
        credentials::ensure_user_token(strava, sessions, session_id, record).await?;
    let detail = strava.get_activity(&access_token, activity_id).await?;

    record.activity_mut(activity_id).detail = Some(detail.clone());
    sessions.save(session_id, record).await?;

    Ok(detail)
}

/// Step 2: the activity's listening window as Unix timestamps. Derived
/// cheaply from the detail blob, never cached.
pub fn activity_window(detail: &Value) -> Result<(i64, i64), AppError> {
    let start_date = detail
        .get("start_date")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Upstream("Activity detail missing start_date".to_string()))?;

    let start = DateTime::parse_from_rfc3339(start_date)
        .map_err(|e| AppError::Upstream(format!("Unparseable start_date: {}", e)))?
        .timestamp();

    let elapsed = detail
        .get("elapsed_time")
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::Upstream("Activity detail missing elapsed_time".to_string()))?;

    Ok((start, start + elapsed))
}

/// Step 3: tracks played during the window, enriched with duration.
/// Cached under the activity id.
pub async fn music_for_activity(
    lastfm: &LastFmClient,
    sessions: &Sessions,
    session_id: &str,
    record: &mut SessionRecord,
    activity_id: &str,
    window: (i64, i64),
) -> Result<Vec<Value>, AppError> {
    if let Some(music) = record.activity(activity_id).and_then(|a| a.music.clone()) {
        return Ok(music);
    }

    let username = record
        .last_fm_username
        .clone()
        .ok_or_else(|| AppError::Upstream("No Last.fm account linked".to_string()))?;

    let (window_start, window_end) = window;
    let mut tracks = lastfm
        .recent_tracks(&username, window_start - LISTEN_BUFFER_SECS, window_end)
        .await?;

    // The currently-playing track is flagged with "@attr" and has no
    // scrobble timestamp; drop it before enrichment.
    tracks.retain(|t| t.get("@attr").is_none());

    for track in &mut tracks {
        let name = track
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let artist = track
            .pointer("/artist/#text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let info = lastfm.track_info(&name, &artist).await?;
        let duration = duration_ms(info.get("duration").unwrap_or(&Value::Null));

        if let Some(obj) = track.as_object_mut() {
            obj.insert("duration".to_string(), json!(duration));
            obj.insert("music_extra_info".to_string(), info);
        }
    }

    let tracks = drop_buffer_artifacts(tracks, window_start);

    record.activity_mut(activity_id).music = Some(tracks.clone());
    sessions.save(session_id, record).await?;

    Ok(tracks)
}

/// Step 4: per-track catalog cross-reference. The result list is
/// persisted after every processed track so a failure mid-list leaves
/// prior tracks durably cached; the final list is the cache.
pub async fn crossref_for_activity(
    spotify: &SpotifyClient,
    sessions: &Sessions,
    session_id: &str,
    record: &mut SessionRecord,
    activity_id: &str,
) -> Result<Vec<Value>, AppError> {
    if let Some(results) = record.activity(activity_id).and_then(|a| a.spotify.clone()) {
        return Ok(results);
    }

    let tracks = record
        .activity(activity_id)
        .and_then(|a| a.music.clone())
        .ok_or_else(|| AppError::Upstream("No music data cached for activity".to_string()))?;

    let mut results = Vec::new();

    for track in &tracks {
        let token = credentials::ensure_app_token(spotify, sessions, session_id, record).await?;

        let name = track.get("name").and_then(Value::as_str).unwrap_or_default();
        let artist = track
            .pointer("/artist/#text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let album = track
            .pointer("/album/#text")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let track_query = format!("{} {} {}", album, artist, name);
        let matched_track = spotify
            .search_track(&token, &track_query)
            .await?
            .ok_or_else(|| AppError::Upstream(format!("No catalog match for track {}", name)))?;
        let artist_data = spotify
            .search_artist(&token, artist)
            .await?
            .ok_or_else(|| AppError::Upstream(format!("No catalog match for artist {}", artist)))?;

        let track_id = entity_id(&matched_track)?;
        let artist_id = entity_id(&artist_data)?;

        let track_data = spotify.get_track(&token, &track_id).await?;
        let top_tracks = spotify
            .artist_top_tracks(&token, &artist_id, TOP_TRACKS_MARKET)
            .await?;

        let artist_name = artist_data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let current_name = track_data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let top_tracks_list = build_top_tracks(&top_tracks, current_name, artist_name);

        let candidates = spotify
            .recommendations(&token, &artist_id, &track_id, RECOMMENDATION_FETCH_LIMIT)
            .await?;
        let recommended_tracks = build_recommendations(candidates, artist_name);

        results.push(json!({
            "current_track": {
                "name": track_data.get("name").cloned().unwrap_or(Value::Null),
                "artist": {
                    "name": artist_name,
                    "image": first_image_url(&artist_data),
                    "top_tracks": top_tracks_list,
                },
                "preview": track_data.get("preview_url").cloned().unwrap_or(Value::Null),
                "genres": artist_data.get("genres").cloned().unwrap_or(Value::Null),
            },
            "recommended_tracks": recommended_tracks,
        }));

        // persist after every track, not batched at the end
        record.activity_mut(activity_id).spotify = Some(results.clone());
        sessions.save(session_id, record).await?;
    }

    Ok(results)
}

/// Last.fm reports duration in milliseconds, as a string, a number, or
/// not at all for obscure tracks. Absent or malformed means 0.
fn duration_ms(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Scrobble timestamp of a track entry, if present.
fn play_timestamp(track: &Value) -> Option<i64> {
    track
        .pointer("/date/uts")
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
}

/// Drop tracks that ended strictly before the window start. These are
/// artifacts of the lead buffer: songs that finished before the run
/// began.
fn drop_buffer_artifacts(tracks: Vec<Value>, window_start: i64) -> Vec<Value> {
    tracks
        .into_iter()
        .filter(|track| {
            let Some(played_at) = play_timestamp(track) else {
                return false;
            };
            let duration_secs = duration_ms(track.get("duration").unwrap_or(&Value::Null)) / 1000;
            played_at + duration_secs >= window_start
        })
        .collect()
}

/// The artist's top tracks, minus the track currently being looked at.
fn build_top_tracks(top_tracks: &[Value], current_name: &str, artist_name: &str) -> Vec<Value> {
    top_tracks
        .iter()
        .filter(|t| t.get("name").and_then(Value::as_str) != Some(current_name))
        .map(|t| {
            json!({
                "image": first_image_url(t),
                "preview_url": t.get("preview_url").cloned().unwrap_or(Value::Null),
                "track_name": t.get("name").cloned().unwrap_or(Value::Null),
                "artist": artist_name,
            })
        })
        .collect()
}

/// Recommendation candidates minus anything by the seed artist, capped
/// at [`RECOMMENDATION_MAX`].
fn build_recommendations(candidates: Vec<Value>, seed_artist: &str) -> Vec<Value> {
    let mut recommended: Vec<Value> = candidates
        .iter()
        .filter(|rec| rec_primary_artist(rec) != Some(seed_artist))
        .map(|rec| {
            json!({
                "image": first_image_url(rec),
                "preview_url": rec.get("preview_url").cloned().unwrap_or(Value::Null),
                "track_name": rec.get("name").cloned().unwrap_or(Value::Null),
                "artist": rec_primary_artist(rec),
            })
        })
        .collect();
    recommended.truncate(RECOMMENDATION_MAX);
    recommended
}

/// Primary artist of a recommendation candidate (first album artist).
fn rec_primary_artist(rec: &Value) -> Option<&str> {
    rec.pointer("/album/artists/0/name").and_then(Value::as_str)
}

fn entity_id(entity: &Value) -> Result<String, AppError> {
    entity
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Upstream("Catalog entity missing id".to_string()))
}
