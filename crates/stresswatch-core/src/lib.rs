//! Live session coordination for the Stresswatch dashboard.
//!
//! Tracks the backend's status stream, detects freezes, runs the capture
//! countdown and owns the report dialog lifecycle.

mod backend;
mod capture;
mod channel;
mod coordinator;
mod dialog;
mod error;
mod ingestor;
mod liveness;
mod recommendations;
mod report;
mod store;
mod timer;

pub use backend::{ByteStream, HttpBackend, SessionBackend, StartAck};
pub use capture::{CaptureCountdown, CaptureTick};
pub use channel::{Notification, NotificationChannel};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle};
pub use dialog::{DialogTick, ReportDialogController, DEFAULT_DECISION_SECS};
pub use error::StresswatchError;
pub use ingestor::{Connected, IngestEvent, SseDecoder, StatusIngestor};
pub use liveness::{FreezeDetected, LivenessMonitor, DEFAULT_FREEZE_THRESHOLD, DEFAULT_POLL_INTERVAL};
pub use recommendations::{recommendation_list, recommendations_for};
pub use report::{BroadcastPrinter, ReportPrinter};
pub use store::{SessionStore, HISTORY_CAPACITY};
pub use timer::{TimerFired, TimerHandle, TimerKind, Timers};

/// Result type for Stresswatch operations.
pub type Result<T> = std::result::Result<T, StresswatchError>;
