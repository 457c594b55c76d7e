//! Report dialog lifecycle: open, decision countdown, close.

use crate::channel::{Notification, NotificationChannel};
use crate::report::ReportPrinter;
use crate::timer::{TimerFired, TimerHandle, TimerKind, Timers};
use chrono::Utc;
use std::time::Duration;
use stresswatch_types::{
    CaptureMode, CloseReason, DialogState, HistoryEntry, ReportPayload, Summary,
};
use tracing::{debug, info};

/// Default operator decision window.
pub const DEFAULT_DECISION_SECS: u32 = 10;

const TICK: Duration = Duration::from_secs(1);

/// Result of a decision-countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogTick {
    Remaining(u32),
    Closed(CloseReason),
}

pub struct ReportDialogController {
    state: DialogState,
    decision_secs: u32,
    trigger: Option<CaptureMode>,
    ticker: Option<TimerHandle>,
}

impl ReportDialogController {
    pub fn new(decision_secs: u32) -> Self {
        Self {
            state: DialogState::Closed,
            decision_secs: decision_secs.max(1),
            trigger: None,
            ticker: None,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Open the dialog. Returns `false` if it was already open.
    pub fn open(&mut self, trigger: CaptureMode, timers: &mut Timers) -> bool {
        if self.is_open() {
            debug!(target: "stresswatch::dialog", "Open ignored, dialog already open");
            return false;
        }
        self.state = DialogState::Open {
            remaining: self.decision_secs,
        };
        self.trigger = Some(trigger);
        self.ticker = Some(timers.every(TimerKind::DialogCountdown, TICK));
        info!(
            target: "stresswatch::dialog",
            "Report dialog opened ({:?}), {}s to decide",
            trigger,
            self.decision_secs
        );
        true
    }

    pub fn on_tick(
        &mut self,
        fired: &TimerFired,
        channel: &mut NotificationChannel,
    ) -> Option<DialogTick> {
        if !self.ticker.as_ref().is_some_and(|t| t.owns(fired)) {
            return None;
        }
        let DialogState::Open { remaining } = self.state else {
            return None;
        };

        if remaining > 1 {
            self.state = DialogState::Open {
                remaining: remaining - 1,
            };
            Some(DialogTick::Remaining(remaining - 1))
        } else {
            self.auto_cancel(channel).map(DialogTick::Closed)
        }
    }

    /// Hand the report to the printer, then close.
    pub fn print(
        &mut self,
        summary: Option<Summary>,
        history: Vec<HistoryEntry>,
        printer: &dyn ReportPrinter,
        channel: &mut NotificationChannel,
    ) -> Option<CloseReason> {
        if !self.is_open() {
            debug!(target: "stresswatch::dialog", "Print ignored, dialog closed");
            return None;
        }
        printer.print(ReportPayload {
            summary,
            history,
            trigger: self.trigger,
            generated_at: Utc::now(),
        });
        self.close(CloseReason::Print, channel)
    }

    pub fn cancel(&mut self, channel: &mut NotificationChannel) -> Option<CloseReason> {
        self.close(CloseReason::Cancel, channel)
    }

    pub fn auto_cancel(&mut self, channel: &mut NotificationChannel) -> Option<CloseReason> {
        self.close(CloseReason::AutoCancel, channel)
    }

    /// A status arrived while open: the stream is live again.
    pub fn on_status(&mut self, channel: &mut NotificationChannel) -> Option<CloseReason> {
        self.close(CloseReason::StreamResumed, channel)
    }

    /// Drop any pending countdown without notifying. Used on shutdown.
    pub fn dispose(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.state = DialogState::Closed;
        self.trigger = None;
    }

    fn close(
        &mut self,
        reason: CloseReason,
        channel: &mut NotificationChannel,
    ) -> Option<CloseReason> {
        if !self.is_open() {
            return None;
        }
        self.dispose();
        info!(target: "stresswatch::dialog", "Report dialog closed: {:?}", reason);
        channel.publish(Notification::UnfreezeRequested);
        Some(reason)
    }
}
