//! Dashboard WebSocket: pushes coordinator events and printable reports to
//! the surface and accepts operator actions from it.

use crate::state::AppState;
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use stresswatch_core::CoordinatorHandle;
use stresswatch_types::{WsClientMessage, WsServerMessage};
use tokio::sync::{broadcast, mpsc};

/// Handle one dashboard connection until either side goes away.
pub async fn handle_global_websocket(socket: WebSocket, state: Arc<AppState>) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut report_rx = state.printer.subscribe();
    let (snapshot, mut event_rx) = state.coordinator.subscribe_with_snapshot().await?;

    tracing::info!(target: "stresswatch::ws", "Dashboard client connected");

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<WsServerMessage>();

    let mut send_task = tokio::spawn(async move {
        if send_json(&mut ws_tx, &WsServerMessage::Snapshot { snapshot })
            .await
            .is_err()
        {
            return;
        }

        loop {
            let msg = tokio::select! {
                event = event_rx.recv() => match event {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(target: "stresswatch::ws", "Dashboard client lagged, {} events dropped", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                report = report_rx.recv() => match report {
                    Ok(report) => WsServerMessage::PrintRequested { report },
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if send_json(&mut ws_tx, &msg).await.is_err() {
                tracing::debug!(target: "stresswatch::ws", "Dashboard client went away mid-send");
                break;
            }
        }
    });

    let coordinator = state.coordinator.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<WsClientMessage>(text.as_str()) {
                        Ok(client_msg) => handle_client_message(&coordinator, client_msg).await,
                        Err(e) => Some(WsServerMessage::Error {
                            code: "invalid_message".to_string(),
                            message: e.to_string(),
                        }),
                    };
                    if let Some(reply) = reply {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::debug!(target: "stresswatch::ws", "Dashboard client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::info!(target: "stresswatch::ws", "Dashboard client disconnected");
    Ok(())
}

/// Apply one operator action. Returns a direct reply for the sender, if any;
/// state changes reach every surface through the event broadcast.
pub async fn handle_client_message(
    coordinator: &CoordinatorHandle,
    msg: WsClientMessage,
) -> Option<WsServerMessage> {
    let result = match msg {
        WsClientMessage::Ping { timestamp } => {
            tracing::trace!(target: "stresswatch::ws::ping", "Ping {}", timestamp);
            return Some(WsServerMessage::Pong { timestamp });
        }
        WsClientMessage::GetState => coordinator
            .snapshot()
            .await
            .map(|snapshot| Some(WsServerMessage::Snapshot { snapshot })),
        WsClientMessage::TriggerCapture => coordinator.trigger_capture().await.map(|_| None),
        WsClientMessage::Print => coordinator.print().await.map(|_| None),
        WsClientMessage::Cancel => coordinator.cancel().await.map(|_| None),
    };

    result.unwrap_or_else(|e| {
        Some(WsServerMessage::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        })
    })
}

async fn send_json<S>(tx: &mut S, msg: &WsServerMessage) -> Result<()>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json.into())).await?;
    Ok(())
}
