//! Session lifecycle routes.

use super::error_response;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stresswatch_types::SessionStarted;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Camera to open; the configured default when absent.
    #[serde(default)]
    pub index: Option<u32>,
}

#[derive(Serialize)]
pub struct StartSessionResponse {
    #[serde(flatten)]
    pub session: SessionStarted,
    pub video_url: String,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    req: Option<Json<StartSessionRequest>>,
) -> Result<Json<StartSessionResponse>, (StatusCode, String)> {
    // A bare POST with no JSON body starts the default camera.
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let camera_index = req.index.unwrap_or(state.config.default_camera_index);
    info!(target: "stresswatch::api", "Start requested for camera {}", camera_index);

    let session = state
        .coordinator
        .start_session(camera_index)
        .await
        .map_err(|e| {
            warn!(target: "stresswatch::api", "Start on camera {} failed: {}", camera_index, e);
            error_response(e)
        })?;

    Ok(Json(StartSessionResponse {
        session,
        video_url: super::summary::video_url_for(&state),
    }))
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OkResponse>, (StatusCode, String)> {
    state
        .coordinator
        .stop_session()
        .await
        .map_err(error_response)?;

    Ok(Json(OkResponse { ok: true }))
}

/// Clear the summary and history without touching the session.
pub async fn reset(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OkResponse>, (StatusCode, String)> {
    state
        .coordinator
        .reset_summary()
        .await
        .map_err(error_response)?;

    Ok(Json(OkResponse { ok: true }))
}
