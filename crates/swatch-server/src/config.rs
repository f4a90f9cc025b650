//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use swatch_core::TrackerScope;
use swatch_settings::SwatchSettings;

use crate::errors::ServerError;

/// Configuration for the swatch server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8000`, `0` for auto-assign).
    pub port: u16,
    /// Push session poll interval in milliseconds.
    pub push_interval_ms: u64,
    /// Whether push sessions share the server's tracker.
    pub tracker_scope: TrackerScope,
    /// Maximum concurrent push sessions.
    pub max_connections: usize,
    /// How long shutdown waits for push sessions, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&SwatchSettings::default())
    }
}

impl ServerConfig {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.push_interval_ms == 0 {
            return Err(ServerError::InvalidConfig(
                "push_interval_ms must be greater than zero".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ServerError::InvalidConfig(
                "max_connections must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Push session poll interval.
    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }

    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl From<&SwatchSettings> for ServerConfig {
    fn from(settings: &SwatchSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            push_interval_ms: settings.push.interval_ms,
            tracker_scope: settings.push.tracker_scope,
            max_connections: settings.server.max_connections,
            shutdown_timeout_secs: settings.server.shutdown_timeout_secs,
        }
    }
}
