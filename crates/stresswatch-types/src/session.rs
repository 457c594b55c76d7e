//! Session, capture and dialog state shared with display surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{StatusMessage, StressLabel};

/// Current best-known estimate plus its recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Level clamped into `[0, 1]`.
    pub level: f64,
    pub label: StressLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_count: Option<u32>,
    pub recommendations: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    pub fn from_status(
        message: &StatusMessage,
        recommendations: Vec<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            level: message.clamped_level(),
            label: message.label,
            face_count: message.face_count,
            recommendations,
            updated_at,
        }
    }

    /// Level as a whole percentage (0-100).
    pub fn level_percent(&self) -> u8 {
        (self.level.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// One row of the bounded history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub level: f64,
    pub label: StressLabel,
}

/// Connection status of the single tracked session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No session running.
    Idle,
    /// Backend running and the status stream is open.
    Running {
        session_id: Uuid,
        camera_index: u32,
        started_at: DateTime<Utc>,
    },
    /// Backend running but the status stream failed or dropped.
    /// Recoverable only by an explicit restart.
    StreamLost {
        session_id: Uuid,
        camera_index: u32,
        message: String,
    },
}

impl ConnectionStatus {
    /// Whether a session is logically active (started and not yet stopped).
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionStatus::Idle)
    }

    pub fn camera_index(&self) -> Option<u32> {
        match self {
            ConnectionStatus::Idle => None,
            ConnectionStatus::Running { camera_index, .. }
            | ConnectionStatus::StreamLost { camera_index, .. } => Some(*camera_index),
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            ConnectionStatus::Idle => None,
            ConnectionStatus::Running { session_id, .. }
            | ConnectionStatus::StreamLost { session_id, .. } => Some(*session_id),
        }
    }
}

/// Freeze-detection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessState {
    pub last_update_at: Option<DateTime<Utc>>,
    /// A freeze has already fired for the current silence episode.
    pub armed: bool,
}

/// How a capture was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Manual,
    FreezeDetected,
}

/// Camera surface state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaptureState {
    #[default]
    Idle,
    CountingDown {
        remaining: u32,
    },
    Frozen,
}

/// Why a capture trigger was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotConnected,
    AlreadyCountingDown,
    AlreadyFrozen,
    Disabled,
}

/// Result of a capture trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// Countdown started at `remaining` seconds.
    Started { remaining: u32 },
    /// Zero-length countdown: the surface froze immediately.
    Frozen,
    Rejected { reason: RejectReason },
}

/// Report dialog state. Only one dialog exists system-wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DialogState {
    #[default]
    Closed,
    Open {
        remaining: u32,
    },
}

impl DialogState {
    pub fn is_open(&self) -> bool {
        matches!(self, DialogState::Open { .. })
    }
}

/// Why the report dialog closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Print,
    Cancel,
    AutoCancel,
    StreamResumed,
}

/// Acknowledgement of a successful session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: Uuid,
    pub camera_index: u32,
    /// A previous source was running and has been replaced.
    pub switched: bool,
}

/// Point-in-time view of everything display surfaces render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub connection: ConnectionStatus,
    pub summary: Option<Summary>,
    pub history: Vec<HistoryEntry>,
    pub liveness: LivenessState,
    pub capture: CaptureState,
    pub dialog: DialogState,
}
