//! Error types for Stresswatch.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StresswatchError {
    /// Status stream failed to open or dropped. Recoverable by a manual restart.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Backend rejected a start/stop command.
    #[error("Command rejected by backend: {0}")]
    Command(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Coordinator is not running")]
    CoordinatorUnavailable,
}

impl StresswatchError {
    /// Short machine-readable code for display surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            StresswatchError::Connection(_) => "connection_error",
            StresswatchError::Command(_) => "command_error",
            StresswatchError::Http(_) => "http_error",
            StresswatchError::CoordinatorUnavailable => "coordinator_unavailable",
        }
    }
}
