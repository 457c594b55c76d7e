//! Cancelable periodic timers that post ticks back to the coordinator.
//!
//! Each timer runs as its own task and only ever sends `TimerFired` notices;
//! the coordinator applies them to component state. A cancelled timer may
//! still have a tick queued, so every tick carries the generation of the
//! handle that produced it and components drop ticks that do not match
//! their current handle.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Which component a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    LivenessPoll,
    CaptureCountdown,
    DialogCountdown,
}

/// A tick delivered to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

/// Spawns timers that all report into one queue.
pub struct Timers {
    tx: mpsc::UnboundedSender<TimerFired>,
    next_generation: u64,
}

impl Timers {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_generation: 1,
            },
            rx,
        )
    }

    /// Start a timer firing every `period`, first tick one period from now.
    pub fn every(&mut self, kind: TimerKind, period: Duration) -> TimerHandle {
        let generation = self.next_generation;
        self.next_generation += 1;

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(TimerFired { kind, generation }).is_err() {
                    break;
                }
            }
        });

        trace!(target: "stresswatch::timer", "Started {:?} timer (generation {})", kind, generation);
        TimerHandle {
            kind,
            generation,
            task,
        }
    }
}

/// Owning handle for a running timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    kind: TimerKind,
    generation: u64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Whether `fired` came from this timer.
    pub fn owns(&self, fired: &TimerFired) -> bool {
        fired.kind == self.kind && fired.generation == self.generation
    }

    pub fn cancel(self) {
        // Drop aborts.
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
        trace!(
            target: "stresswatch::timer",
            "Cancelled {:?} timer (generation {})",
            self.kind,
            self.generation
        );
    }
}
