use axum::extract::State;
use axum::Json;
use inkcycle_core::orchestrator::RefreshAction;
use inkcycle_core::types::{Settings, WriteOutcome};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateNowBody {
    plugin_id: String,
    #[serde(default)]
    settings: Settings,
}

/// POST /api/display/update-now: render ad hoc content and show it.
///
/// Blocks until the scheduler has processed this exact request; the
/// response is the write outcome or the failure it produced.
pub async fn update_now(
    State(app): State<AppState>,
    Json(body): Json<UpdateNowBody>,
) -> Result<Json<WriteOutcome>, AppError> {
    let plugin_id = body.plugin_id.trim();
    if plugin_id.is_empty() {
        return Err(AppError::bad_request("plugin_id is required"));
    }
    let outcome = app
        .orchestrator
        .submit(RefreshAction::ManualRefresh {
            plugin_id: plugin_id.to_string(),
            settings: body.settings,
        })
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct PluginInstanceBody {
    playlist: String,
    plugin_id: String,
    instance: String,
    #[serde(default)]
    force: bool,
}

/// POST /api/display/plugin-instance: show one instance of a playlist now.
pub async fn show_plugin_instance(
    State(app): State<AppState>,
    Json(body): Json<PluginInstanceBody>,
) -> Result<Json<WriteOutcome>, AppError> {
    let outcome = app
        .orchestrator
        .submit(RefreshAction::PlaylistRefresh {
            playlist: body.playlist,
            plugin_id: body.plugin_id,
            instance: body.instance,
            force: body.force,
        })
        .await?;
    Ok(Json(outcome))
}

/// GET /api/display/current: scheduler state and the last applied write.
pub async fn current(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "state": app.orchestrator.state(),
        "refresh_info": app.store.get_refresh_record(),
    }))
}
