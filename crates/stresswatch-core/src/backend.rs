//! Client for the video-analysis backend.

use crate::{Result, StresswatchError};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raw bytes of the status stream as they arrive.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Backend acknowledgement of a start command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartAck {
    /// `started` or `already_running`.
    pub status: String,
    pub camera_index: u32,
    /// Whether the landmark/emotion pipeline loaded; otherwise the backend
    /// falls back to its heuristic estimator.
    pub accurate_pipeline: bool,
    pub pipeline_error: Option<String>,
}

/// Request/response commands plus the push stream.
pub trait SessionBackend: Send + Sync + 'static {
    fn start(&self, camera_index: u32) -> impl Future<Output = Result<StartAck>> + Send;

    fn stop(&self) -> impl Future<Output = Result<()>> + Send;

    fn open_stream(&self) -> impl Future<Output = Result<ByteStream>> + Send;
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    dlib_ready: Option<bool>,
    #[serde(default)]
    dlib_error: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct StartRequest {
    index: u32,
}

/// HTTP backend speaking the `/api/start`, `/api/stop`, `/api/stream` protocol.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    command_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, command_timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .connect_timeout(command_timeout)
            .build()?;
        Ok(Self {
            base_url,
            client,
            command_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether the backend answers its health probe.
    pub async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(self.url("/"))
            .timeout(self.command_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(target: "stresswatch::backend", "Health probe failed: {}", e);
                false
            }
        }
    }
}

impl SessionBackend for HttpBackend {
    async fn start(&self, camera_index: u32) -> Result<StartAck> {
        let response = self
            .client
            .post(self.url("/api/start"))
            .timeout(self.command_timeout)
            .json(&StartRequest {
                index: camera_index,
            })
            .send()
            .await
            .map_err(|e| StresswatchError::Command(format!("start request failed: {}", e)))?;

        let status = response.status();
        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| StresswatchError::Command(format!("unreadable start reply: {}", e)))?;

        if !status.is_success() || body.error.is_some() {
            let message = body
                .error
                .unwrap_or_else(|| format!("backend returned {}", status));
            warn!(target: "stresswatch::backend", "Start rejected: {}", message);
            return Err(StresswatchError::Command(message));
        }

        let ack = StartAck {
            status: body.status.unwrap_or_else(|| "started".to_string()),
            camera_index: body.index.unwrap_or(camera_index),
            accurate_pipeline: body.dlib_ready.unwrap_or(false),
            pipeline_error: body.dlib_error,
        };

        if ack.camera_index != camera_index {
            return Err(StresswatchError::Command(format!(
                "backend is still running camera {}",
                ack.camera_index
            )));
        }

        info!(
            target: "stresswatch::backend",
            "Backend {} camera {} (accurate pipeline: {})",
            ack.status,
            ack.camera_index,
            ack.accurate_pipeline
        );
        Ok(ack)
    }

    async fn stop(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/stop"))
            .timeout(self.command_timeout)
            .send()
            .await
            .map_err(|e| StresswatchError::Command(format!("stop request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(StresswatchError::Command(format!(
                "backend returned {} for stop",
                response.status()
            )));
        }
        info!(target: "stresswatch::backend", "Backend stopped");
        Ok(())
    }

    async fn open_stream(&self) -> Result<ByteStream> {
        let response = self
            .client
            .get(self.url("/api/stream"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StresswatchError::Connection(format!("stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(StresswatchError::Connection(format!(
                "stream returned {}",
                response.status()
            )));
        }

        debug!(target: "stresswatch::backend", "Status stream opened");
        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| StresswatchError::Connection(format!("stream dropped: {}", e)))
            .boxed())
    }
}
