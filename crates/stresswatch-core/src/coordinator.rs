//! Live session coordinator.
//!
//! One task owns the session store, the liveness monitor, the capture
//! countdown and the report dialog. Commands from display surfaces, status
//! events from the stream and timer ticks are applied strictly one at a
//! time, so no component state is ever shared or locked.

use crate::backend::SessionBackend;
use crate::capture::{CaptureCountdown, CaptureTick};
use crate::channel::{Notification, NotificationChannel};
use crate::dialog::{DialogTick, ReportDialogController};
use crate::ingestor::{IngestEvent, StatusIngestor};
use crate::liveness::{LivenessMonitor, DEFAULT_FREEZE_THRESHOLD, DEFAULT_POLL_INTERVAL};
use crate::report::ReportPrinter;
use crate::store::SessionStore;
use crate::timer::{TimerFired, TimerKind, Timers};
use crate::{Result, StresswatchError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use stresswatch_types::{
    CaptureMode, CloseReason, ConnectionStatus, CoordinatorSnapshot, RejectReason,
    SessionStarted, TriggerOutcome, WsServerMessage,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub freeze_threshold: Duration,
    pub poll_interval: Duration,
    /// Countdown length for operator-triggered captures.
    pub manual_countdown_secs: u32,
    /// Countdown length for freeze-triggered captures; zero freezes at once.
    pub freeze_countdown_secs: u32,
    pub manual_capture_enabled: bool,
    pub freeze_capture_enabled: bool,
    pub decision_secs: u32,
    /// Buffer size of the display-surface event broadcast.
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            freeze_threshold: DEFAULT_FREEZE_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            manual_countdown_secs: 5,
            freeze_countdown_secs: 0,
            manual_capture_enabled: true,
            freeze_capture_enabled: true,
            decision_secs: crate::dialog::DEFAULT_DECISION_SECS,
            event_capacity: 256,
        }
    }
}

enum Command {
    Start {
        camera_index: u32,
        reply: oneshot::Sender<Result<SessionStarted>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    ResetSummary {
        reply: oneshot::Sender<()>,
    },
    TriggerCapture {
        reply: oneshot::Sender<TriggerOutcome>,
    },
    ResetCapture {
        reply: oneshot::Sender<()>,
    },
    Print {
        reply: oneshot::Sender<Option<CloseReason>>,
    },
    Cancel {
        reply: oneshot::Sender<Option<CloseReason>>,
    },
    Snapshot {
        reply: oneshot::Sender<CoordinatorSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(CoordinatorSnapshot, broadcast::Receiver<WsServerMessage>)>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable entry point for display surfaces and routes.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<WsServerMessage>,
    notifications: broadcast::Sender<Notification>,
}

impl CoordinatorHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| StresswatchError::CoordinatorUnavailable)?;
        rx.await.map_err(|_| StresswatchError::CoordinatorUnavailable)
    }

    /// Start a session on `camera_index`. Starting while running switches
    /// the source.
    pub async fn start_session(&self, camera_index: u32) -> Result<SessionStarted> {
        self.request(|reply| Command::Start {
            camera_index,
            reply,
        })
        .await?
    }

    pub async fn stop_session(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    /// Clear the summary and history log.
    pub async fn reset_summary(&self) -> Result<()> {
        self.request(|reply| Command::ResetSummary { reply }).await
    }

    /// Operator capture button.
    pub async fn trigger_capture(&self) -> Result<TriggerOutcome> {
        self.request(|reply| Command::TriggerCapture { reply }).await
    }

    /// External unfreeze signal for the camera surface.
    pub async fn reset_capture(&self) -> Result<()> {
        self.request(|reply| Command::ResetCapture { reply }).await
    }

    /// Print from the open dialog. `None` if no dialog was open.
    pub async fn print(&self) -> Result<Option<CloseReason>> {
        self.request(|reply| Command::Print { reply }).await
    }

    pub async fn cancel(&self) -> Result<Option<CloseReason>> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stop the coordinator task and cancel every timer. Safe to call more
    /// than once.
    pub async fn shutdown(&self) {
        if self.request(|reply| Command::Shutdown { reply }).await.is_err() {
            debug!(target: "stresswatch::session", "Coordinator already shut down");
        }
    }

    /// Current state plus a receiver for every event after it. Both are
    /// taken in one coordinator step, so nothing is missed or repeated.
    pub async fn subscribe_with_snapshot(
        &self,
    ) -> Result<(CoordinatorSnapshot, broadcast::Receiver<WsServerMessage>)> {
        self.request(|reply| Command::Subscribe { reply }).await
    }

    /// Events for display surfaces.
    pub fn subscribe(&self) -> broadcast::Receiver<WsServerMessage> {
        self.events.subscribe()
    }

    /// Raw notification-channel traffic.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }
}

pub struct Coordinator<B: SessionBackend> {
    config: CoordinatorConfig,
    backend: Arc<B>,
    printer: Arc<dyn ReportPrinter>,
    store: SessionStore,
    channel: NotificationChannel,
    ingestor: StatusIngestor,
    liveness: LivenessMonitor,
    capture: CaptureCountdown,
    dialog: ReportDialogController,
    timers: Timers,
    events: broadcast::Sender<WsServerMessage>,
}

impl<B: SessionBackend> Coordinator<B> {
    /// Spawn the coordinator task and return its handle.
    pub fn spawn(
        config: CoordinatorConfig,
        backend: Arc<B>,
        printer: Arc<dyn ReportPrinter>,
    ) -> CoordinatorHandle {
        let (command_tx, command_rx) = mpsc::channel(64);
        let capacity = config.event_capacity.max(1);
        let (events, _) = broadcast::channel(capacity);
        let (timers, timer_rx) = Timers::new();
        let (ingestor, ingest_rx) = StatusIngestor::new();
        let channel = NotificationChannel::new(capacity);

        let handle = CoordinatorHandle {
            commands: command_tx,
            events: events.clone(),
            notifications: channel.observer_sender(),
        };

        let coordinator = Self {
            store: SessionStore::new(),
            channel,
            ingestor,
            liveness: LivenessMonitor::new(config.freeze_threshold, config.poll_interval),
            capture: CaptureCountdown::new(
                config.manual_countdown_secs,
                config.freeze_countdown_secs,
            ),
            dialog: ReportDialogController::new(config.decision_secs),
            timers,
            events,
            backend,
            printer,
            config,
        };

        tokio::spawn(coordinator.run(command_rx, timer_rx, ingest_rx));
        handle
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
        mut ingest_rx: mpsc::UnboundedReceiver<IngestEvent>,
    ) {
        info!(target: "stresswatch::session", "Coordinator started");
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Some(fired) = timer_rx.recv() => self.handle_timer(fired),
                Some(event) = ingest_rx.recv() => self.handle_ingest(event),
            }
            self.dispatch_pending();
        }
        self.teardown();
        info!(target: "stresswatch::session", "Coordinator stopped");
    }

    /// Returns `false` when the coordinator should exit.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start {
                camera_index,
                reply,
            } => {
                let result = self.start_session(camera_index).await;
                if let Err(e) = &result {
                    self.emit_error(e);
                }
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                let result = self.stop_session().await;
                if let Err(e) = &result {
                    self.emit_error(e);
                }
                let _ = reply.send(result);
            }
            Command::ResetSummary { reply } => {
                self.store.reset();
                info!(target: "stresswatch::session", "Summary and history cleared");
                self.emit(WsServerMessage::SummaryCleared);
                let _ = reply.send(());
            }
            Command::TriggerCapture { reply } => {
                let outcome = self.trigger_capture(CaptureMode::Manual);
                let _ = reply.send(outcome);
            }
            Command::ResetCapture { reply } => {
                self.capture.reset();
                self.emit_capture();
                let _ = reply.send(());
            }
            Command::Print { reply } => {
                let closed = self.dialog.print(
                    self.store.summary().cloned(),
                    self.store.history(),
                    self.printer.as_ref(),
                    &mut self.channel,
                );
                if let Some(reason) = closed {
                    self.emit_dialog_closed(reason);
                }
                let _ = reply.send(closed);
            }
            Command::Cancel { reply } => {
                let closed = self.dialog.cancel(&mut self.channel);
                if let Some(reason) = closed {
                    self.emit_dialog_closed(reason);
                }
                let _ = reply.send(closed);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Subscribe { reply } => {
                let _ = reply.send((self.snapshot(), self.events.subscribe()));
            }
            Command::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn start_session(&mut self, camera_index: u32) -> Result<SessionStarted> {
        let previous = self.store.connection().clone();
        let switched = previous.is_active();
        if switched {
            info!(
                target: "stresswatch::session",
                "Switching source from camera {:?} to {}",
                previous.camera_index(),
                camera_index
            );
            if let Err(e) = self.backend.stop().await {
                warn!(target: "stresswatch::session", "Stopping previous source failed: {}", e);
            }
        }

        if let Err(e) = self.backend.start(camera_index).await {
            if switched {
                warn!(
                    target: "stresswatch::session",
                    "Camera {} refused ({}), restoring previous source",
                    camera_index,
                    e
                );
                self.restore_session(&previous).await;
            }
            return Err(e);
        }

        if switched {
            self.release_session();
            self.set_connection(ConnectionStatus::Idle);
        }

        let session_id = Uuid::new_v4();
        self.capture.connect();
        self.liveness.start(&mut self.timers);

        if let Err(e) = self.ingestor.connect(self.backend.as_ref()).await {
            error!(target: "stresswatch::session", "Session {} has no status stream: {}", session_id, e);
            self.set_connection(ConnectionStatus::StreamLost {
                session_id,
                camera_index,
                message: e.to_string(),
            });
            return Err(e);
        }

        self.set_connection(ConnectionStatus::Running {
            session_id,
            camera_index,
            started_at: Utc::now(),
        });
        info!(target: "stresswatch::session", "Session {} running on camera {}", session_id, camera_index);

        Ok(SessionStarted {
            session_id,
            camera_index,
            switched,
        })
    }

    /// Bring the previous source back after a failed switch. Liveness and
    /// capture were never released, so only the backend and the stream
    /// need reopening.
    async fn restore_session(&mut self, previous: &ConnectionStatus) {
        let (Some(session_id), Some(camera_index)) = (previous.session_id(), previous.camera_index())
        else {
            return;
        };

        if let Err(e) = self.backend.start(camera_index).await {
            error!(
                target: "stresswatch::session",
                "Restoring camera {} failed: {}",
                camera_index,
                e
            );
            self.release_session();
            self.mark_stream_lost(session_id, camera_index, &e);
            return;
        }

        match self.ingestor.connect(self.backend.as_ref()).await {
            Ok(_) => {
                let started_at = match previous {
                    ConnectionStatus::Running { started_at, .. } => *started_at,
                    _ => Utc::now(),
                };
                self.set_connection(ConnectionStatus::Running {
                    session_id,
                    camera_index,
                    started_at,
                });
                info!(target: "stresswatch::session", "Session {} restored on camera {}", session_id, camera_index);
            }
            Err(e) => {
                error!(target: "stresswatch::session", "Session {} has no status stream: {}", session_id, e);
                self.mark_stream_lost(session_id, camera_index, &e);
            }
        }
    }

    fn mark_stream_lost(&mut self, session_id: Uuid, camera_index: u32, error: &StresswatchError) {
        self.set_connection(ConnectionStatus::StreamLost {
            session_id,
            camera_index,
            message: error.to_string(),
        });
        self.emit_error(error);
    }

    async fn stop_session(&mut self) -> Result<()> {
        self.backend.stop().await?;
        self.release_session();
        if self.store.connection().is_active() {
            info!(target: "stresswatch::session", "Session stopped");
            self.set_connection(ConnectionStatus::Idle);
        }
        Ok(())
    }

    /// Local teardown of the running session. An open dialog is left for
    /// the operator to finish.
    fn release_session(&mut self) {
        self.ingestor.disconnect();
        self.liveness.stop();
        let before = self.capture.state();
        self.capture.disconnect();
        if self.capture.state() != before {
            self.emit_capture();
        }
    }

    fn trigger_capture(&mut self, mode: CaptureMode) -> TriggerOutcome {
        let enabled = match mode {
            CaptureMode::Manual => self.config.manual_capture_enabled,
            CaptureMode::FreezeDetected => self.config.freeze_capture_enabled,
        };
        let outcome = if enabled {
            self.capture.trigger(mode, &mut self.timers)
        } else {
            debug!(target: "stresswatch::capture", "{:?} captures are disabled", mode);
            TriggerOutcome::Rejected {
                reason: RejectReason::Disabled,
            }
        };

        match outcome {
            TriggerOutcome::Started { .. } => self.emit_capture(),
            TriggerOutcome::Frozen => {
                self.emit_capture();
                self.channel
                    .publish(Notification::DialogOpenRequested { mode });
            }
            TriggerOutcome::Rejected { .. } => {}
        }
        self.emit(WsServerMessage::CaptureTriggered { mode, outcome });
        outcome
    }

    fn handle_timer(&mut self, fired: TimerFired) {
        match fired.kind {
            TimerKind::LivenessPoll => {
                let now = Instant::now();
                if let Some(freeze) = self.liveness.on_poll(&fired, now, self.dialog.is_open()) {
                    self.emit(WsServerMessage::FreezeDetected {
                        silence_ms: freeze.silence.as_millis() as u64,
                    });
                    self.trigger_capture(CaptureMode::FreezeDetected);
                }
            }
            TimerKind::CaptureCountdown => match self.capture.on_tick(&fired) {
                Some(CaptureTick::Remaining(_)) => self.emit_capture(),
                Some(CaptureTick::Frozen(mode)) => {
                    self.emit_capture();
                    self.channel
                        .publish(Notification::DialogOpenRequested { mode });
                }
                None => trace!(target: "stresswatch::timer", "Stale capture tick"),
            },
            TimerKind::DialogCountdown => match self.dialog.on_tick(&fired, &mut self.channel) {
                Some(DialogTick::Remaining(_)) => self.emit_dialog(),
                Some(DialogTick::Closed(reason)) => self.emit_dialog_closed(reason),
                None => trace!(target: "stresswatch::timer", "Stale dialog tick"),
            },
        }
    }

    fn handle_ingest(&mut self, event: IngestEvent) {
        if !self.ingestor.is_current(&event) {
            trace!(target: "stresswatch::ingest", "Dropping event from a closed connection");
            return;
        }
        match event {
            IngestEvent::Status { message, .. } => {
                self.channel.publish(Notification::Status(message));
            }
            IngestEvent::Closed { reason, .. } => {
                self.ingestor.mark_closed();
                let connection = self.store.connection().clone();
                if let (Some(session_id), Some(camera_index)) =
                    (connection.session_id(), connection.camera_index())
                {
                    self.set_connection(ConnectionStatus::StreamLost {
                        session_id,
                        camera_index,
                        message: reason.clone(),
                    });
                }
                self.emit_error(&StresswatchError::Connection(reason));
            }
        }
    }

    /// Deliver queued notifications to every component, in publish order.
    fn dispatch_pending(&mut self) {
        while let Some(notification) = self.channel.next_pending() {
            match notification {
                Notification::Status(message) => {
                    let at = Utc::now();
                    let summary = self.store.apply_status(&message, at).clone();
                    self.emit(WsServerMessage::SummaryUpdate {
                        summary,
                        history: self.store.history(),
                    });
                    self.liveness.record_status(Instant::now(), at);
                    if let Some(reason) = self.dialog.on_status(&mut self.channel) {
                        self.emit_dialog_closed(reason);
                    }
                }
                Notification::DialogOpenRequested { mode } => {
                    if self.dialog.open(mode, &mut self.timers) {
                        self.emit_dialog();
                    }
                }
                Notification::UnfreezeRequested => {
                    self.capture.reset();
                    self.emit_capture();
                }
            }
        }
    }

    fn teardown(&mut self) {
        self.ingestor.disconnect();
        self.liveness.stop();
        self.capture.reset();
        self.dialog.dispose();
    }

    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            connection: self.store.connection().clone(),
            summary: self.store.summary().cloned(),
            history: self.store.history(),
            liveness: self.liveness.state(),
            capture: self.capture.state(),
            dialog: self.dialog.state(),
        }
    }

    fn set_connection(&mut self, status: ConnectionStatus) {
        self.store.set_connection(status.clone());
        self.emit(WsServerMessage::ConnectionChanged { status });
    }

    fn emit(&self, message: WsServerMessage) {
        // No subscribers is fine.
        let _ = self.events.send(message);
    }

    fn emit_capture(&self) {
        self.emit(WsServerMessage::CaptureChanged {
            state: self.capture.state(),
        });
    }

    fn emit_dialog(&self) {
        self.emit(WsServerMessage::DialogChanged {
            state: self.dialog.state(),
        });
    }

    fn emit_dialog_closed(&self, reason: CloseReason) {
        self.emit(WsServerMessage::DialogClosed { reason });
        self.emit_dialog();
    }

    fn emit_error(&self, error: &StresswatchError) {
        self.emit(WsServerMessage::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }
}
