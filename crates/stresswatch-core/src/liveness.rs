//! Freeze detection over the status stream.

use crate::timer::{TimerFired, TimerHandle, TimerKind, Timers};
use chrono::{DateTime, Utc};
use std::time::Duration;
use stresswatch_types::LivenessState;
use tokio::time::Instant;
use tracing::{debug, info};

/// Silence after which the stream is considered frozen.
pub const DEFAULT_FREEZE_THRESHOLD: Duration = Duration::from_millis(5000);

/// How often silence is checked.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A freeze signal raised by [`LivenessMonitor::on_poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeDetected {
    pub silence: Duration,
}

pub struct LivenessMonitor {
    threshold: Duration,
    poll_interval: Duration,
    last_update: Option<Instant>,
    last_update_at: Option<DateTime<Utc>>,
    armed: bool,
    poll: Option<TimerHandle>,
}

impl LivenessMonitor {
    pub fn new(threshold: Duration, poll_interval: Duration) -> Self {
        Self {
            threshold,
            poll_interval,
            last_update: None,
            last_update_at: None,
            armed: false,
            poll: None,
        }
    }

    /// Begin polling for a new session. Previous timestamps are forgotten.
    pub fn start(&mut self, timers: &mut Timers) {
        self.last_update = None;
        self.last_update_at = None;
        self.armed = false;
        self.poll = Some(timers.every(TimerKind::LivenessPoll, self.poll_interval));
        debug!(
            target: "stresswatch::liveness",
            "Polling every {:?} (threshold {:?})",
            self.poll_interval,
            self.threshold
        );
    }

    /// Stop polling. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.cancel();
            debug!(target: "stresswatch::liveness", "Polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    /// A status arrived: refresh the timestamp and allow the next freeze.
    pub fn record_status(&mut self, now: Instant, at: DateTime<Utc>) {
        self.last_update = Some(now);
        self.last_update_at = Some(at);
        if self.armed {
            debug!(target: "stresswatch::liveness", "Status resumed, freeze re-armed");
        }
        self.armed = false;
    }

    /// Handle a poll tick. Returns a freeze at most once per silence episode.
    pub fn on_poll(
        &mut self,
        fired: &TimerFired,
        now: Instant,
        dialog_open: bool,
    ) -> Option<FreezeDetected> {
        if !self.poll.as_ref().is_some_and(|poll| poll.owns(fired)) {
            return None;
        }
        self.check(now, dialog_open)
    }

    fn check(&mut self, now: Instant, dialog_open: bool) -> Option<FreezeDetected> {
        let last_update = self.last_update?;
        let silence = now.saturating_duration_since(last_update);
        if silence < self.threshold || self.armed || dialog_open {
            return None;
        }

        self.armed = true;
        info!(
            target: "stresswatch::liveness",
            "No status for {} ms, freeze detected",
            silence.as_millis()
        );
        Some(FreezeDetected { silence })
    }

    pub fn state(&self) -> LivenessState {
        LivenessState {
            last_update_at: self.last_update_at,
            armed: self.armed,
        }
    }
}
