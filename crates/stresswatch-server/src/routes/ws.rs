//! WebSocket upgrade for dashboard surfaces.

use crate::global_ws;
use crate::state::AppState;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use std::sync::Arc;

pub async fn events(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = global_ws::handle_global_websocket(socket, state).await {
            tracing::error!(target: "stresswatch::ws", "Dashboard WebSocket error: {}", e);
        }
    })
}
