//! Report dialog decisions.

use super::error_response;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use stresswatch_types::CloseReason;

#[derive(Serialize)]
pub struct DialogClosedResponse {
    pub reason: CloseReason,
}

fn closed(
    reason: Option<CloseReason>,
) -> Result<Json<DialogClosedResponse>, (StatusCode, String)> {
    reason
        .map(|reason| Json(DialogClosedResponse { reason }))
        .ok_or((StatusCode::CONFLICT, "No report dialog is open".to_string()))
}

pub async fn print(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DialogClosedResponse>, (StatusCode, String)> {
    let reason = state.coordinator.print().await.map_err(error_response)?;
    closed(reason)
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DialogClosedResponse>, (StatusCode, String)> {
    let reason = state.coordinator.cancel().await.map_err(error_response)?;
    closed(reason)
}
