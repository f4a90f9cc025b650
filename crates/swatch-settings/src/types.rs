//! Settings types. All structs deserialize with defaults for missing keys.

use serde::{Deserialize, Serialize};
use swatch_core::TrackerScope;

/// Root settings document (`~/.swatch/settings.json`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwatchSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Push session settings.
    pub push: PushSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Listener and connection limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP/WebSocket port.
    pub port: u16,
    /// Maximum concurrent push sessions.
    pub max_connections: usize,
    /// How long shutdown waits for push sessions to close, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_connections: 64,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Push session behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Poll interval of each push session, in milliseconds.
    pub interval_ms: u64,
    /// Whether sessions share one change tracker.
    pub tracker_scope: TrackerScope,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            tracker_scope: TrackerScope::PerSession,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
