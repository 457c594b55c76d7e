//! In-process notification channel shared by the coordinator's components.
//!
//! Publishing never runs subscribers re-entrantly: notifications queue up and
//! the owner drains them in publish order, handing each one to every
//! component before taking the next. Observers outside the coordinator get a
//! copy of each notification through a broadcast subscription.

use std::collections::VecDeque;
use stresswatch_types::{CaptureMode, StatusMessage};
use tokio::sync::broadcast;
use tracing::trace;

/// The fixed notification vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A well-formed status arrived from the backend stream.
    Status(StatusMessage),
    /// The report dialog closed; camera surfaces return to idle.
    UnfreezeRequested,
    /// A capture finished; the report dialog should open.
    DialogOpenRequested { mode: CaptureMode },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Status(_) => "status",
            Notification::UnfreezeRequested => "unfreeze_requested",
            Notification::DialogOpenRequested { .. } => "dialog_open_requested",
        }
    }
}

pub struct NotificationChannel {
    pending: VecDeque<Notification>,
    observers: broadcast::Sender<Notification>,
}

impl NotificationChannel {
    pub fn new(capacity: usize) -> Self {
        let (observers, _) = broadcast::channel(capacity);
        Self {
            pending: VecDeque::new(),
            observers,
        }
    }

    /// Queue a notification for in-order delivery.
    pub fn publish(&mut self, notification: Notification) {
        trace!(target: "stresswatch::events", "Publishing {}", notification.kind());
        // No observers is fine.
        let _ = self.observers.send(notification.clone());
        self.pending.push_back(notification);
    }

    /// Next notification awaiting delivery, oldest first.
    pub fn next_pending(&mut self) -> Option<Notification> {
        self.pending.pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Observe every notification published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.observers.subscribe()
    }

    /// Sender side of the observer fan-out, for subscribing later from
    /// outside the owner.
    pub fn observer_sender(&self) -> broadcast::Sender<Notification> {
        self.observers.clone()
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new(256)
    }
}
