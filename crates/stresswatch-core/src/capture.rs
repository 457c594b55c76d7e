//! Capture countdown for the camera surface.

use crate::timer::{TimerFired, TimerHandle, TimerKind, Timers};
use std::time::Duration;
use stresswatch_types::{CaptureMode, CaptureState, RejectReason, TriggerOutcome};
use tracing::{debug, info};

const TICK: Duration = Duration::from_secs(1);

/// Result of a countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTick {
    /// Still counting; `remaining` seconds left.
    Remaining(u32),
    /// Countdown finished and the surface froze.
    Frozen(CaptureMode),
}

pub struct CaptureCountdown {
    state: CaptureState,
    connected: bool,
    manual_secs: u32,
    freeze_secs: u32,
    mode: Option<CaptureMode>,
    ticker: Option<TimerHandle>,
}

impl CaptureCountdown {
    /// `manual_secs` and `freeze_secs` are the countdown lengths per trigger
    /// mode; zero freezes immediately.
    pub fn new(manual_secs: u32, freeze_secs: u32) -> Self {
        Self {
            state: CaptureState::Idle,
            connected: false,
            manual_secs,
            freeze_secs,
            mode: None,
            ticker: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Camera surface came up.
    pub fn connect(&mut self) {
        self.connected = true;
    }

    /// Camera surface went away: refuse new triggers and abandon any
    /// countdown in progress. A frozen surface stays frozen until reset.
    pub fn disconnect(&mut self) {
        self.connected = false;
        if matches!(self.state, CaptureState::CountingDown { .. }) {
            self.clear();
            debug!(target: "stresswatch::capture", "Countdown abandoned on disconnect");
        }
    }

    pub fn trigger(&mut self, mode: CaptureMode, timers: &mut Timers) -> TriggerOutcome {
        let rejected = match self.state {
            _ if !self.connected => Some(RejectReason::NotConnected),
            CaptureState::CountingDown { .. } => Some(RejectReason::AlreadyCountingDown),
            CaptureState::Frozen => Some(RejectReason::AlreadyFrozen),
            CaptureState::Idle => None,
        };
        if let Some(reason) = rejected {
            debug!(target: "stresswatch::capture", "{:?} trigger ignored: {:?}", mode, reason);
            return TriggerOutcome::Rejected { reason };
        }

        self.mode = Some(mode);
        let seconds = match mode {
            CaptureMode::Manual => self.manual_secs,
            CaptureMode::FreezeDetected => self.freeze_secs,
        };

        if seconds == 0 {
            self.state = CaptureState::Frozen;
            info!(target: "stresswatch::capture", "{:?} capture frozen immediately", mode);
            return TriggerOutcome::Frozen;
        }

        self.state = CaptureState::CountingDown { remaining: seconds };
        self.ticker = Some(timers.every(TimerKind::CaptureCountdown, TICK));
        info!(target: "stresswatch::capture", "{:?} capture counting down from {}", mode, seconds);
        TriggerOutcome::Started { remaining: seconds }
    }

    pub fn on_tick(&mut self, fired: &TimerFired) -> Option<CaptureTick> {
        if !self.ticker.as_ref().is_some_and(|t| t.owns(fired)) {
            return None;
        }
        let CaptureState::CountingDown { remaining } = self.state else {
            return None;
        };

        if remaining > 1 {
            self.state = CaptureState::CountingDown {
                remaining: remaining - 1,
            };
            return Some(CaptureTick::Remaining(remaining - 1));
        }

        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.state = CaptureState::Frozen;
        let mode = self.mode.unwrap_or(CaptureMode::Manual);
        info!(target: "stresswatch::capture", "{:?} capture frozen", mode);
        Some(CaptureTick::Frozen(mode))
    }

    /// Return to idle unconditionally. Safe to call repeatedly.
    pub fn reset(&mut self) {
        if self.state != CaptureState::Idle {
            debug!(target: "stresswatch::capture", "Reset from {:?}", self.state);
        }
        self.clear();
    }

    fn clear(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.state = CaptureState::Idle;
        self.mode = None;
    }
}
