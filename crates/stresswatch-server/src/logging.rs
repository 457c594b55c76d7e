//! Tracing setup for the server binary.
//!
//! A preset picked from the CLI flags decides the base directives per
//! `stresswatch::*` target; `--log target=level` entries are appended on top.
//! `RUST_LOG` replaces all of it when set.

use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const TARGET_PREFIX: &str = "stresswatch::";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format '{}' (expected text or json)", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Session lifecycle, freezes and dialog decisions.
    #[default]
    Production,
    Verbose,
    /// Everything except poll and ping chatter.
    Debug,
    Trace,
    /// Warnings and errors only.
    Quiet,
}

impl LogPreset {
    fn directives(self) -> &'static [&'static str] {
        match self {
            LogPreset::Production => &[
                "stresswatch::startup=info",
                "stresswatch::api=info",
                "stresswatch::ws=info",
                "stresswatch::ws::ping=off",
                "stresswatch::session=info",
                "stresswatch::backend=info",
                "stresswatch::ingest=warn",
                "stresswatch::liveness=info",
                "stresswatch::capture=info",
                "stresswatch::dialog=info",
                "stresswatch::events=off",
                "stresswatch::timer=off",
                "tower_http=warn",
            ],
            LogPreset::Verbose => &[
                "stresswatch=info",
                "stresswatch::ws::ping=off",
                "tower_http=info",
            ],
            LogPreset::Debug => &[
                "stresswatch=debug",
                "stresswatch::ws::ping=off",
                "stresswatch::timer=off",
                "tower_http=debug",
            ],
            LogPreset::Trace => &["stresswatch=trace", "tower_http=trace"],
            LogPreset::Quiet => &["stresswatch=warn", "tower_http=error"],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Full target name to level, e.g. `stresswatch::liveness` -> DEBUG.
    pub overrides: HashMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    /// Build from CLI flags. When several preset flags are given the
    /// quietest wins, then trace, debug and verbose in that order.
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        let preset = match (quiet, trace, debug, verbose) {
            (true, ..) => LogPreset::Quiet,
            (_, true, ..) => LogPreset::Trace,
            (_, _, true, _) => LogPreset::Debug,
            (_, _, _, true) => LogPreset::Verbose,
            _ => LogPreset::Production,
        };

        let overrides = log_overrides
            .iter()
            .flat_map(|entry| entry.split(','))
            .filter_map(parse_override)
            .collect();

        Self {
            preset,
            overrides,
            format,
        }
    }

    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }

        let mut directives: Vec<String> = self
            .preset
            .directives()
            .iter()
            .map(|d| d.to_string())
            .collect();
        for (target, level) in &self.overrides {
            directives.push(format!("{}={}", target, level_name(*level)));
        }

        EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// `ingest=debug` -> (`stresswatch::ingest`, DEBUG). Entries without a
/// valid level are skipped.
fn parse_override(entry: &str) -> Option<(String, Level)> {
    let (target, level) = entry.split_once('=')?;
    let target = target.trim();
    let level = parse_level(level.trim())?;

    let target = if target.starts_with(TARGET_PREFIX) || target == "tower_http" {
        target.to_string()
    } else {
        format!("{}{}", TARGET_PREFIX, target)
    };
    Some((target, level))
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init(),
    }
}
