//! Capture button and unfreeze.

use super::error_response;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use stresswatch_types::TriggerOutcome;

/// Rejected triggers answer 409 with the reason in the body.
pub async fn trigger(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<TriggerOutcome>), (StatusCode, String)> {
    let outcome = state
        .coordinator
        .trigger_capture()
        .await
        .map_err(error_response)?;

    let status = match outcome {
        TriggerOutcome::Started { .. } => StatusCode::ACCEPTED,
        TriggerOutcome::Frozen => StatusCode::OK,
        TriggerOutcome::Rejected { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)))
}

pub async fn reset(State(state): State<Arc<AppState>>) -> Result<StatusCode, (StatusCode, String)> {
    state
        .coordinator
        .reset_capture()
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}
