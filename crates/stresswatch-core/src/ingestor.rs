//! Status stream ingestion.
//!
//! The backend pushes Server-Sent Events whose `data:` field carries one
//! status payload. The ingestor reads the byte stream on its own task,
//! decodes events, drops anything malformed and forwards well-formed
//! statuses to the coordinator.

use crate::backend::{ByteStream, SessionBackend};
use crate::{Result, StresswatchError};
use futures::StreamExt;
use stresswatch_types::{StatusMessage, StressLabel};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Upper bound on bytes held for an unfinished line or event.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Incremental Server-Sent Events decoder.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across chunks decode intact. An event that grows past
/// [`MAX_PENDING_BYTES`] is dropped along with the rest of its line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    data_len: usize,
    /// Skipping the tail of an oversized line.
    discarding: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the data of every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(newline) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(newline + 1);
            rest = tail;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            self.buffer.extend_from_slice(head);
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, &mut events);
        }

        if !self.discarding {
            self.buffer.extend_from_slice(rest);
            if self.buffer.len() + self.data_len > MAX_PENDING_BYTES {
                self.overflow();
                self.discarding = true;
            }
        }
        events
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            if !self.data.is_empty() {
                events.push(self.data.join("\n"));
                self.data.clear();
                self.data_len = 0;
            }
        } else if line.starts_with(':') {
            // Comment / keepalive.
        } else if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data_len += value.len() + 1;
            if self.data_len > MAX_PENDING_BYTES {
                self.overflow();
            } else {
                self.data.push(value.to_string());
            }
        }
        // `event:`, `id:` and `retry:` fields carry nothing we use.
    }

    fn overflow(&mut self) {
        warn!(
            target: "stresswatch::ingest",
            "Dropping status event larger than {} bytes",
            MAX_PENDING_BYTES
        );
        self.buffer.clear();
        self.data.clear();
        self.data_len = 0;
    }
}

/// What the read task reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Status {
        connection: u64,
        message: StatusMessage,
    },
    /// The stream ended or failed.
    Closed { connection: u64, reason: String },
}

/// Proof of an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connected {
    pub connection: u64,
}

struct StreamConnection {
    id: u64,
    task: JoinHandle<()>,
}

pub struct StatusIngestor {
    tx: mpsc::UnboundedSender<IngestEvent>,
    connection: Option<StreamConnection>,
    next_id: u64,
}

impl StatusIngestor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IngestEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                connection: None,
                next_id: 1,
            },
            rx,
        )
    }

    /// Open the status stream, replacing any current connection.
    pub async fn connect<B: SessionBackend>(&mut self, backend: &B) -> Result<Connected> {
        self.disconnect();

        let stream = backend.open_stream().await.map_err(|e| match e {
            StresswatchError::Connection(msg) => StresswatchError::Connection(msg),
            other => StresswatchError::Connection(other.to_string()),
        })?;

        let id = self.next_id;
        self.next_id += 1;
        let task = tokio::spawn(read_stream(stream, self.tx.clone(), id));
        self.connection = Some(StreamConnection { id, task });

        info!(target: "stresswatch::ingest", "Status stream connected (connection {})", id);
        Ok(Connected { connection: id })
    }

    /// Tear down the stream. Returns whether a connection was open.
    pub fn disconnect(&mut self) -> bool {
        match self.connection.take() {
            Some(connection) => {
                connection.task.abort();
                info!(target: "stresswatch::ingest", "Status stream disconnected (connection {})", connection.id);
                true
            }
            None => false,
        }
    }

    /// Whether `event` came from the current connection.
    pub fn is_current(&self, event: &IngestEvent) -> bool {
        let id = match event {
            IngestEvent::Status { connection, .. } | IngestEvent::Closed { connection, .. } => {
                *connection
            }
        };
        self.connection.as_ref().is_some_and(|c| c.id == id)
    }

    /// Forget a connection whose read task has already finished.
    pub fn mark_closed(&mut self) {
        self.connection = None;
    }
}

impl Drop for StatusIngestor {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn read_stream(mut stream: ByteStream, tx: mpsc::UnboundedSender<IngestEvent>, connection: u64) {
    let mut decoder = SseDecoder::new();

    let reason = loop {
        match stream.next().await {
            Some(Ok(chunk)) => {
                for payload in decoder.push(&chunk) {
                    match StatusMessage::parse(&payload) {
                        Ok(message) => {
                            if !message.label_matches_level() {
                                debug!(
                                    target: "stresswatch::ingest",
                                    "Label {} disagrees with level {:.2} (expected {})",
                                    message.label,
                                    message.level,
                                    StressLabel::from_level(message.clamped_level())
                                );
                            }
                            trace!(target: "stresswatch::ingest", "Status {:?}", message);
                            if tx.send(IngestEvent::Status { connection, message }).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            debug!(target: "stresswatch::ingest", "Dropping malformed status: {}", e);
                        }
                    }
                }
            }
            Some(Err(e)) => break e.to_string(),
            None => break "stream ended".to_string(),
        }
    };

    warn!(target: "stresswatch::ingest", "Status stream closed: {}", reason);
    let _ = tx.send(IngestEvent::Closed { connection, reason });
}
