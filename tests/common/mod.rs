// SPDX-License-Identifier: MIT

//! Shared test harness: a mock provider server standing in for Strava,
//! Last.fm and Spotify, plus an app factory pointing every client at it.

use axum::{
    extract::{Form, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use runbeats::{
    config::Config,
    services::{LastFmClient, SpotifyClient, StravaClient},
    session::Sessions,
    store::MemorySessionStore,
    AppState,
};

/// Request counters and canned responses for the mock providers.
#[derive(Default)]
pub struct MockState {
    // Strava
    pub strava_exchange_calls: AtomicUsize,
    pub strava_refresh_calls: AtomicUsize,
    pub activity_list_calls: AtomicUsize,
    pub activity_detail_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    /// Page sizes to serve, in order. A missing entry serves an empty page.
    pub activity_pages: Mutex<Vec<usize>>,

    // Last.fm
    pub recent_tracks_calls: AtomicUsize,
    pub track_info_calls: AtomicUsize,
    /// Raw value served under recenttracks.track (array or bare object).
    pub recent_tracks_body: Mutex<Value>,
    /// duration (ms) served by track.getInfo, keyed by track name.
    pub track_durations: Mutex<HashMap<String, i64>>,
    /// Usernames user.getinfo recognizes.
    pub known_lastfm_users: Mutex<Vec<String>>,

    // Spotify
    pub spotify_token_calls: AtomicUsize,
    pub spotify_search_calls: AtomicUsize,
    /// After this many search calls, searches come back empty.
    pub spotify_search_limit: Mutex<Option<usize>>,
    /// Recommendation candidates served for any seed.
    pub recommendation_body: Mutex<Vec<Value>>,
}

/// Handle to a running mock provider server.
pub struct MockProviders {
    pub base_url: String,
    pub state: Arc<MockState>,
}

/// Spawn the mock provider server on an ephemeral port.
pub async fn spawn_mock_providers() -> MockProviders {
    let state = Arc::new(MockState {
        recent_tracks_body: Mutex::new(Value::Array(vec![])),
        ..Default::default()
    });

    let router = Router::new()
        // Strava
        .route("/oauth/token", post(strava_token))
        .route("/api/v3/athlete/activities", get(activity_list))
        .route("/api/v3/activities/{id}", get(activity_detail))
        .route("/api/v3/activities/{id}/streams", get(activity_streams))
        .route("/api/v3/athlete", get(athlete_profile))
        // Last.fm
        .route("/2.0/", post(lastfm_call))
        // Spotify
        .route("/api/token", post(spotify_token))
        .route("/v1/search", get(spotify_search))
        .route("/v1/tracks/{id}", get(spotify_track))
        .route("/v1/artists/{id}/top-tracks", get(spotify_top_tracks))
        .route("/v1/recommendations", get(spotify_recommendations))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock provider");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockProviders {
        base_url: format!("http://{}", addr),
        state,
    }
}

/// Create the app under test with every provider client pointed at the
/// mock server. Returns the router and the shared state (for seeding
/// sessions directly).
pub async fn create_test_app(mock: &MockProviders) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let sessions = Sessions::new(Arc::new(MemorySessionStore::new()));

    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    )
    .with_base_url(&mock.base_url);
    let lastfm = LastFmClient::new(config.last_fm_api_key.clone()).with_base_url(&mock.base_url);
    let spotify = SpotifyClient::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
    )
    .with_base_url(&mock.base_url);

    let state = Arc::new(AppState {
        config,
        sessions,
        strava,
        lastfm,
        spotify,
    });

    (runbeats::routes::create_router(state.clone()), state)
}

/// Read a JSON response body.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse body")
}

// ─── Strava handlers ─────────────────────────────────────────

async fn strava_token(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            state.strava_exchange_calls.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "access_token": "exchanged_access",
                "refresh_token": "exchanged_refresh",
                "expires_at": chrono::Utc::now().timestamp() + 3600,
                "athlete": {"id": 42, "firstname": "Test", "lastname": "Runner"},
            }))
        }
        _ => {
            state.strava_refresh_calls.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "access_token": "refreshed_access",
                "refresh_token": "refreshed_refresh",
                "expires_at": chrono::Utc::now().timestamp() + 3600,
            }))
        }
    }
}

async fn activity_list(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let call = state.activity_list_calls.fetch_add(1, Ordering::SeqCst);
    let page: usize = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(call + 1);

    let size = state
        .activity_pages
        .lock()
        .unwrap()
        .get(page - 1)
        .copied()
        .unwrap_or(0);

    let items: Vec<Value> = (0..size)
        .map(|i| json!({"id": page * 1000 + i, "type": "Run", "name": "Run"}))
        .collect();
    Json(json!(items))
}

async fn activity_detail(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    state.activity_detail_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "id": id.parse::<u64>().unwrap_or(0),
        "name": "Morning Run",
        "type": "Run",
        "start_date": "2024-01-01T10:00:00Z",
        "elapsed_time": 3600,
    }))
}

async fn activity_streams(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.stream_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "velocity_smooth": {"data": [2.5, 2.7], "series_type": "time"},
        "latlng": {"data": [[51.5, -0.1], [51.6, -0.2]], "series_type": "time"},
    }))
}

async fn athlete_profile() -> Json<Value> {
    Json(json!({"id": 42, "firstname": "Test", "lastname": "Runner"}))
}

// ─── Last.fm handler ─────────────────────────────────────────

async fn lastfm_call(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    match params.get("method").map(String::as_str) {
        Some("user.getrecenttracks") => {
            state.recent_tracks_calls.fetch_add(1, Ordering::SeqCst);
            let body = state.recent_tracks_body.lock().unwrap().clone();
            Json(json!({"recenttracks": {"track": body}}))
        }
        Some("track.getInfo") => {
            state.track_info_calls.fetch_add(1, Ordering::SeqCst);
            let name = params.get("track").cloned().unwrap_or_default();
            let duration = state
                .track_durations
                .lock()
                .unwrap()
                .get(&name)
                .copied()
                .unwrap_or(0);
            Json(json!({
                "track": {"name": name, "duration": duration.to_string()},
            }))
        }
        Some("user.getinfo") => {
            let user = params.get("user").cloned().unwrap_or_default();
            let known = state.known_lastfm_users.lock().unwrap().contains(&user);
            if known {
                Json(json!({"user": {"name": user}}))
            } else {
                Json(json!({"error": 6, "message": "User not found"}))
            }
        }
        _ => Json(json!({"error": 3, "message": "Invalid method"})),
    }
}

// ─── Spotify handlers ────────────────────────────────────────

async fn spotify_token(State(state): State<Arc<MockState>>) -> Json<Value> {
    let n = state.spotify_token_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "access_token": format!("app_token_{}", n),
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
}

async fn spotify_search(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let call = state.spotify_search_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(limit) = *state.spotify_search_limit.lock().unwrap() {
        if call >= limit {
            return Json(json!({
                "tracks": {"items": []},
                "artists": {"items": []},
            }));
        }
    }
    match params.get("type").map(String::as_str) {
        Some("track") => Json(json!({
            "tracks": {"items": [{"id": "track1", "name": "Song One"}]},
        })),
        _ => Json(json!({
            "artists": {"items": [{
                "id": "artist1",
                "name": "Seed Artist",
                "images": [{"url": "http://img/artist"}],
                "genres": ["electronic", "ambient"],
            }]},
        })),
    }
}

async fn spotify_track(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "id": id,
        "name": "Song One",
        "preview_url": "http://preview/song1",
    }))
}

async fn spotify_top_tracks() -> Json<Value> {
    Json(json!({
        "tracks": [
            {"name": "Song One", "preview_url": "http://preview/song1"},
            {"name": "Big Hit", "preview_url": "http://preview/hit",
             "album": {"images": [{"url": "http://img/hit"}]}},
            {"name": "Deep Cut", "preview_url": null},
        ],
    }))
}

async fn spotify_recommendations(State(state): State<Arc<MockState>>) -> Json<Value> {
    let tracks = state.recommendation_body.lock().unwrap().clone();
    Json(json!({"tracks": tracks}))
}
