//! HTTP route handlers.

pub mod capture;
pub mod report;
pub mod session;
pub mod summary;
pub mod ws;

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use stresswatch_core::StresswatchError;

/// Everything mounted under `/api`.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Session lifecycle
        .route("/session/start", post(session::start))
        .route("/session/stop", post(session::stop))
        .route("/session/reset", post(session::reset))
        // Dashboard state
        .route("/state", get(summary::state))
        .route("/summary", get(summary::summary))
        .route("/history", get(summary::history))
        .route("/video-url", get(summary::video_url))
        // Capture and report dialog
        .route("/capture", post(capture::trigger))
        .route("/capture/reset", post(capture::reset))
        .route("/report/print", post(report::print))
        .route("/report/cancel", post(report::cancel))
        .route("/health", get(health))
}

/// Everything mounted under `/ws`.
pub fn ws_routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(ws::events))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend_reachable: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend_reachable: state.backend.is_reachable().await,
    })
}

/// Map a coordinator error onto an HTTP status.
pub(crate) fn error_response(e: StresswatchError) -> (StatusCode, String) {
    let status = match &e {
        StresswatchError::Command(_) => StatusCode::BAD_REQUEST,
        StresswatchError::Connection(_) | StresswatchError::Http(_) => StatusCode::BAD_GATEWAY,
        StresswatchError::CoordinatorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
