//! Session store: current summary, bounded history and connection status.

use crate::recommendations::recommendation_list;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use stresswatch_types::{ConnectionStatus, HistoryEntry, StatusMessage, Summary};
use tracing::debug;

/// Maximum number of history rows kept.
pub const HISTORY_CAPACITY: usize = 10;

pub struct SessionStore {
    summary: Option<Summary>,
    /// Most recent first.
    history: VecDeque<HistoryEntry>,
    connection: ConnectionStatus,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            summary: None,
            history: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
            connection: ConnectionStatus::Idle,
        }
    }

    /// Replace the summary and log the status at the front of the history.
    pub fn apply_status(&mut self, message: &StatusMessage, at: DateTime<Utc>) -> &Summary {
        let summary = Summary::from_status(message, recommendation_list(message.label), at);

        self.history.push_front(HistoryEntry {
            timestamp: at,
            level: summary.level,
            label: summary.label,
        });
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_back();
        }

        debug!(
            target: "stresswatch::session",
            "Summary updated: {} {}% ({} history entries)",
            summary.label,
            summary.level_percent(),
            self.history.len()
        );

        self.summary.insert(summary)
    }

    /// Clear the summary and history. Connection status is untouched.
    pub fn reset(&mut self) {
        self.summary = None;
        self.history.clear();
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.iter().cloned().collect()
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn set_connection(&mut self, connection: ConnectionStatus) {
        self.connection = connection;
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use stresswatch_types::StressLabel;

    fn status(level: f64) -> StatusMessage {
        StatusMessage::new(level, StressLabel::from_level(level), Some(1))
    }

    #[test]
    fn test_apply_status_replaces_summary() {
        let mut store = SessionStore::new();
        let t0 = Utc::now();

        store.apply_status(&status(0.1), t0);
        let summary = store.apply_status(&status(0.9), t0 + Duration::seconds(1));

        assert_eq!(summary.label, StressLabel::High);
        assert_eq!(summary.recommendations, recommendation_list(StressLabel::High));
        assert_eq!(store.summary().unwrap().level, 0.9);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut store = SessionStore::new();
        let t0 = Utc::now();
        for i in 0..12 {
            store.apply_status(&status(i as f64 / 20.0), t0 + Duration::seconds(i));
        }

        let history = store.history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].timestamp, t0 + Duration::seconds(11));
        assert_eq!(history[9].timestamp, t0 + Duration::seconds(2));
    }

    #[test]
    fn test_history_clamps_level() {
        let mut store = SessionStore::new();
        store.apply_status(&StatusMessage::new(3.0, StressLabel::High, None), Utc::now());
        assert_eq!(store.history()[0].level, 1.0);
    }

    #[test]
    fn test_reset_keeps_connection() {
        let mut store = SessionStore::new();
        store.set_connection(ConnectionStatus::StreamLost {
            session_id: uuid::Uuid::new_v4(),
            camera_index: 0,
            message: "dropped".to_string(),
        });
        store.apply_status(&status(0.5), Utc::now());

        store.reset();

        assert!(store.summary().is_none());
        assert_eq!(store.history().len(), 0);
        assert!(store.connection().is_active());
    }

    proptest! {
        #[test]
        fn prop_history_bounded_and_most_recent_first(levels in prop::collection::vec(-1.0f64..2.0, 0..40)) {
            let mut store = SessionStore::new();
            let t0 = Utc::now();
            for (i, level) in levels.iter().enumerate() {
                store.apply_status(&status(*level), t0 + Duration::milliseconds(i as i64 * 500));
                prop_assert!(store.history().len() <= HISTORY_CAPACITY);
            }

            let history = store.history();
            prop_assert_eq!(history.len(), levels.len().min(HISTORY_CAPACITY));
            for pair in history.windows(2) {
                prop_assert!(pair[0].timestamp > pair[1].timestamp);
            }
            for entry in &history {
                prop_assert!((0.0..=1.0).contains(&entry.level));
            }
        }
    }
}
