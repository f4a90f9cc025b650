//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;
use swatch_core::TrackerScope;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"shutting_down"` once shutdown has begun.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live push sessions.
    pub connections: usize,
    /// How push sessions track changes.
    pub tracker_scope: TrackerScope,
    /// Last value observed by the server's tracker.
    pub last_value: Option<String>,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    shutting_down: bool,
    connections: usize,
    tracker_scope: TrackerScope,
    last_value: Option<String>,
) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" }.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        tracker_scope,
        last_value,
    }
}
