//! Print collaborator seam.

use stresswatch_types::ReportPayload;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Receives report payloads when the operator prints.
///
/// Printing is fire-and-forget: implementations must not block and the
/// dialog closes whether or not anything rendered.
pub trait ReportPrinter: Send + Sync {
    fn print(&self, report: ReportPayload);
}

/// Hands reports to every subscribed display surface, which renders and
/// prints them.
pub struct BroadcastPrinter {
    tx: broadcast::Sender<ReportPayload>,
}

impl BroadcastPrinter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReportPayload> {
        self.tx.subscribe()
    }
}

impl ReportPrinter for BroadcastPrinter {
    fn print(&self, report: ReportPayload) {
        match self.tx.send(report) {
            Ok(receivers) => {
                debug!(target: "stresswatch::dialog", "Report handed to {} surface(s)", receivers)
            }
            Err(_) => warn!(target: "stresswatch::dialog", "No surface connected to print the report"),
        }
    }
}
