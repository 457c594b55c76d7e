//! Status messages pushed by the video-analysis backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Level at or above which the backend reports `High`.
pub const HIGH_THRESHOLD: f64 = 0.75;

/// Level at or above which the backend reports `Moderate`.
pub const MODERATE_THRESHOLD: f64 = 0.35;

/// Coarse stress classification attached to every status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StressLabel {
    Low,
    Moderate,
    High,
}

impl StressLabel {
    /// Classify a raw level the same way the backend does.
    pub fn from_level(level: f64) -> Self {
        if level >= HIGH_THRESHOLD {
            StressLabel::High
        } else if level >= MODERATE_THRESHOLD {
            StressLabel::Moderate
        } else {
            StressLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StressLabel::Low => "Low",
            StressLabel::Moderate => "Moderate",
            StressLabel::High => "High",
        }
    }
}

impl std::fmt::Display for StressLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an inbound status payload was rejected.
#[derive(Error, Debug)]
pub enum StatusParseError {
    #[error("invalid status payload: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("status level is not a finite number")]
    NonFiniteLevel,
}

/// One tick of the backend's estimate.
///
/// Wire shape: `{"level": 0.42, "label": "Moderate", "faces": 1}` where
/// `faces` is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: f64,
    pub label: StressLabel,
    #[serde(rename = "faces", default, skip_serializing_if = "Option::is_none")]
    pub face_count: Option<u32>,
}

impl StatusMessage {
    pub fn new(level: f64, label: StressLabel, face_count: Option<u32>) -> Self {
        Self {
            level,
            label,
            face_count,
        }
    }

    /// Parse a single JSON status payload.
    pub fn parse(payload: &str) -> Result<Self, StatusParseError> {
        let message: StatusMessage = serde_json::from_str(payload.trim())?;
        if !message.level.is_finite() {
            return Err(StatusParseError::NonFiniteLevel);
        }
        Ok(message)
    }

    /// Level clamped into `[0, 1]`.
    pub fn clamped_level(&self) -> f64 {
        self.level.clamp(0.0, 1.0)
    }

    /// Whether the backend's label agrees with its own thresholds.
    pub fn label_matches_level(&self) -> bool {
        StressLabel::from_level(self.clamped_level()) == self.label
    }
}
