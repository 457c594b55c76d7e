//! WebSocket message protocol between dashboard surfaces and the server.

use serde::{Deserialize, Serialize};

use crate::{
    CaptureMode, CaptureState, CloseReason, ConnectionStatus, CoordinatorSnapshot, DialogState,
    HistoryEntry, ReportPayload, Summary, TriggerOutcome,
};

/// Messages sent from a dashboard surface to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// Ping for keepalive.
    Ping { timestamp: u64 },
    /// Request the full current state.
    GetState,
    /// Operator pressed the capture button.
    TriggerCapture,
    /// Operator confirmed printing from the report dialog.
    Print,
    /// Operator dismissed the report dialog.
    Cancel,
}

/// Messages pushed from the server to every dashboard surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// Full state, sent on connect and on `get_state`.
    Snapshot { snapshot: CoordinatorSnapshot },
    /// A new status replaced the summary.
    SummaryUpdate {
        summary: Summary,
        history: Vec<HistoryEntry>,
    },
    /// History and summary were cleared by an explicit reset.
    SummaryCleared,
    ConnectionChanged { status: ConnectionStatus },
    /// No status arrived for `silence_ms`.
    FreezeDetected { silence_ms: u64 },
    CaptureChanged { state: CaptureState },
    /// Reply to a capture trigger from this surface.
    CaptureTriggered {
        mode: CaptureMode,
        outcome: TriggerOutcome,
    },
    DialogChanged { state: DialogState },
    DialogClosed { reason: CloseReason },
    /// Render and print this report.
    PrintRequested { report: ReportPayload },
    /// Keepalive reply.
    Pong { timestamp: u64 },
    Error { code: String, message: String },
}
