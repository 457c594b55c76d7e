//! Read-only dashboard state.

use super::error_response;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use stresswatch_core::HISTORY_CAPACITY;
use stresswatch_types::{CoordinatorSnapshot, HistoryEntry, Summary};

#[derive(Serialize)]
pub struct SummaryResponse {
    pub summary: Option<Summary>,
    /// Gauge position, 0-100.
    pub level_percent: Option<u8>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    /// Most recent first.
    pub entries: Vec<HistoryEntry>,
    pub capacity: usize,
}

#[derive(Serialize)]
pub struct VideoUrlResponse {
    pub url: String,
}

pub async fn state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CoordinatorSnapshot>, (StatusCode, String)> {
    let snapshot = state.coordinator.snapshot().await.map_err(error_response)?;
    Ok(Json(snapshot))
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    let snapshot = state.coordinator.snapshot().await.map_err(error_response)?;
    let level_percent = snapshot.summary.as_ref().map(Summary::level_percent);

    Ok(Json(SummaryResponse {
        summary: snapshot.summary,
        level_percent,
    }))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let snapshot = state.coordinator.snapshot().await.map_err(error_response)?;

    Ok(Json(HistoryResponse {
        entries: snapshot.history,
        capacity: HISTORY_CAPACITY,
    }))
}

/// MJPEG feed served by the backend, for the camera surface's `<img>`.
pub async fn video_url(State(state): State<Arc<AppState>>) -> Json<VideoUrlResponse> {
    Json(VideoUrlResponse {
        url: video_url_for(&state),
    })
}

pub(crate) fn video_url_for(state: &AppState) -> String {
    format!("{}/api/video", state.backend.base_url())
}
