use axum::extract::State;
use axum::Json;
use chrono::Utc;
use inkcycle_core::types::TimeOfDay;

use crate::state::AppState;

/// GET /api/playlists: every playlist plus the one active right now.
pub async fn list_playlists(State(app): State<AppState>) -> Json<serde_json::Value> {
    let now = Utc::now();
    let (playlists, active) = app.store.read(|c| {
        let local = c.local_time(now);
        let active = c
            .playlist_config
            .determine_active_playlist(TimeOfDay::from_time(local.time()))
            .map(|p| p.name.clone());
        (c.playlist_config.playlists.clone(), active)
    });
    Json(serde_json::json!({
        "active": active,
        "playlists": playlists,
    }))
}
