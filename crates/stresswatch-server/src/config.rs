//! Server configuration.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stresswatch_core::CoordinatorConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Base URL of the video-analysis backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Camera used when a start request names none.
    #[serde(default)]
    pub default_camera_index: u32,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub dialog: DialogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_freeze_threshold_ms")]
    pub freeze_threshold_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_manual_countdown_secs")]
    pub manual_countdown_secs: u32,
    /// Zero freezes the camera surface as soon as the stream stalls.
    #[serde(default)]
    pub freeze_countdown_secs: u32,
    #[serde(default = "default_true")]
    pub manual_enabled: bool,
    #[serde(default = "default_true")]
    pub freeze_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DialogConfig {
    #[serde(default = "default_decision_secs")]
    pub decision_secs: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./frontend/dist")
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_command_timeout_ms() -> u64 {
    10_000
}

fn default_freeze_threshold_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_manual_countdown_secs() -> u32 {
    5
}

fn default_decision_secs() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            freeze_threshold_ms: default_freeze_threshold_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            manual_countdown_secs: default_manual_countdown_secs(),
            freeze_countdown_secs: 0,
            manual_enabled: true,
            freeze_enabled: true,
        }
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            decision_secs: default_decision_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            backend_url: default_backend_url(),
            default_camera_index: 0,
            command_timeout_ms: default_command_timeout_ms(),
            liveness: LivenessConfig::default(),
            capture: CaptureConfig::default(),
            dialog: DialogConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from `config/default.toml`, then the user config
    /// directory, or fall back to defaults.
    pub fn load() -> Result<Self> {
        let local = PathBuf::from("config/default.toml");
        if local.exists() {
            return Self::load_from(&local);
        }

        if let Some(user) = dirs::config_dir().map(|d| d.join("stresswatch").join("config.toml")) {
            if user.exists() {
                return Self::load_from(&user);
            }
        }

        Ok(Config::default())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            freeze_threshold: Duration::from_millis(self.liveness.freeze_threshold_ms),
            poll_interval: Duration::from_millis(self.liveness.poll_interval_ms.max(1)),
            manual_countdown_secs: self.capture.manual_countdown_secs,
            freeze_countdown_secs: self.capture.freeze_countdown_secs,
            manual_capture_enabled: self.capture.manual_enabled,
            freeze_capture_enabled: self.capture.freeze_enabled,
            decision_secs: self.dialog.decision_secs,
            ..CoordinatorConfig::default()
        }
    }
}
