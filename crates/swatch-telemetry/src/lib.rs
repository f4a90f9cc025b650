//! # swatch-telemetry
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (`RUST_LOG`
//! wins over configuration) in front of a `fmt` layer that writes either
//! human-readable lines or JSON.

#![deny(unsafe_code)]

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub log_level: Level,
    /// Per-module level overrides (e.g. `"tower_http"` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Build from a level name such as `"debug"`.
    pub fn from_level_name(level: &str, json: bool) -> Result<Self, TelemetryError> {
        Ok(Self {
            log_level: parse_level(level)?,
            json,
            ..Self::default()
        })
    }

    /// Add a per-module level override.
    #[must_use]
    pub fn with_module_level(mut self, module: impl Into<String>, level: Level) -> Self {
        self.module_levels.push((module.into(), level));
        self
    }
}

/// Telemetry setup errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured level is not a `tracing` level name.
    #[error("invalid log level: {0:?}")]
    InvalidLevel(String),
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Parse a level name (case-insensitive).
pub fn parse_level(level: &str) -> Result<Level, TelemetryError> {
    Level::from_str(level.trim()).map_err(|_| TelemetryError::InvalidLevel(level.to_string()))
}

/// Filter directives derived from the config, e.g. `info,tower_http=debug`.
pub fn filter_directives(config: &TelemetryConfig) -> String {
    let mut filter = config.log_level.to_string().to_lowercase();
    for (module, level) in &config.module_levels {
        filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    filter
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
    });
    let text_layer = (!config.json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;
    Ok(())
}
