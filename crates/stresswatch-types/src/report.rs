//! Payload handed to the print collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CaptureMode, HistoryEntry, Summary};

/// Snapshot printed when the operator confirms a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    /// `None` when no status arrived during the session.
    pub summary: Option<Summary>,
    pub history: Vec<HistoryEntry>,
    /// What opened the dialog this report was printed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<CaptureMode>,
    pub generated_at: DateTime<Utc>,
}
