//! Shared application state.

use crate::config::Config;
use std::sync::Arc;
use stresswatch_core::{BroadcastPrinter, Coordinator, CoordinatorHandle, HttpBackend};

/// Reports queued for surfaces that have not read them yet.
const REPORT_BUFFER: usize = 16;

pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub printer: Arc<BroadcastPrinter>,
    pub backend: Arc<HttpBackend>,
    pub config: Config,
}

impl AppState {
    /// Build the backend client and spawn the coordinator. Must be called
    /// inside a Tokio runtime.
    pub fn new(config: Config) -> stresswatch_core::Result<Self> {
        let backend = Arc::new(HttpBackend::new(
            config.backend_url.clone(),
            config.command_timeout(),
        )?);
        let printer = Arc::new(BroadcastPrinter::new(REPORT_BUFFER));
        let coordinator = Coordinator::spawn(
            config.to_coordinator_config(),
            backend.clone(),
            printer.clone(),
        );

        Ok(Self {
            coordinator,
            printer,
            backend,
            config,
        })
    }
}
