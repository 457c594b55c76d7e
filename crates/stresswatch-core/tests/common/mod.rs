//! Common test utilities for coordinator integration tests.

#![allow(dead_code)]

use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stresswatch_core::{
    BroadcastPrinter, ByteStream, Coordinator, CoordinatorConfig, CoordinatorHandle, Result,
    SessionBackend, StartAck, StresswatchError,
};
use stresswatch_types::{StatusMessage, StressLabel};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// In-process backend whose status stream is fed by the test.
#[derive(Default)]
pub struct FakeBackend {
    stream_tx: Mutex<Option<mpsc::UnboundedSender<Result<Vec<u8>>>>>,
    pub starts: Mutex<Vec<u32>>,
    pub stops: AtomicUsize,
    pub reject_start: AtomicBool,
    /// Single camera index the backend refuses to open.
    pub reject_camera: Mutex<Option<u32>>,
    pub reject_stop: AtomicBool,
    pub refuse_stream: AtomicBool,
}

impl FakeBackend {
    /// Push one status event onto the open stream.
    pub fn push_status(&self, level: f64, label: StressLabel) {
        let payload = serde_json::to_string(&StatusMessage::new(level, label, Some(1))).unwrap();
        self.push_raw(format!("data: {}\n\n", payload).as_bytes());
    }

    pub fn push_raw(&self, bytes: &[u8]) {
        if let Some(tx) = self.stream_tx.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(bytes.to_vec()));
        }
    }

    /// End the stream as if the backend went away.
    pub fn drop_stream(&self) {
        self.stream_tx.lock().unwrap().take();
    }

    pub fn start_calls(&self) -> Vec<u32> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SessionBackend for FakeBackend {
    async fn start(&self, camera_index: u32) -> Result<StartAck> {
        let rejected = *self.reject_camera.lock().unwrap() == Some(camera_index);
        if rejected || self.reject_start.load(Ordering::SeqCst) {
            return Err(StresswatchError::Command(format!(
                "Failed to open camera index {}",
                camera_index
            )));
        }
        self.starts.lock().unwrap().push(camera_index);
        Ok(StartAck {
            status: "started".to_string(),
            camera_index,
            accurate_pipeline: false,
            pipeline_error: None,
        })
    }

    async fn stop(&self) -> Result<()> {
        if self.reject_stop.load(Ordering::SeqCst) {
            return Err(StresswatchError::Command("backend busy".to_string()));
        }
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_stream(&self) -> Result<ByteStream> {
        if self.refuse_stream.load(Ordering::SeqCst) {
            return Err(StresswatchError::Connection("stream returned 503".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.stream_tx.lock().unwrap() = Some(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub printer: Arc<BroadcastPrinter>,
    pub handle: CoordinatorHandle,
}

pub fn spawn_with(config: CoordinatorConfig) -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let printer = Arc::new(BroadcastPrinter::new(16));
    let handle = Coordinator::spawn(config, backend.clone(), printer.clone());
    Harness {
        backend,
        printer,
        handle,
    }
}

pub fn spawn() -> Harness {
    spawn_with(CoordinatorConfig::default())
}

/// Let spawned tasks drain without moving the clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
