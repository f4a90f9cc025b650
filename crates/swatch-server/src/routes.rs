//! HTTP handlers: pull endpoints, the live page, and the `WebSocket` upgrade.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use swatch_core::{ChangeTracker, TrackerScope};
use tracing::{debug, warn};

use crate::health::{self, HealthResponse};
use crate::server::AppState;
use crate::websocket::session;

/// Page that subscribes to `/ws` and renders each pushed value.
pub const TIME_PAGE: &str = include_str!("../assets/timeupdating.html");

/// `GET /`
pub async fn index() -> &'static str {
    "Hello world!"
}

/// `GET /time`
pub async fn time(State(state): State<AppState>) -> String {
    current_value(&state.tracker)
}

/// The changed value if there is one, else the last observed value.
///
/// Empty only if the tracker has never observed anything; the server primes
/// its tracker at construction so this does not happen in practice.
pub fn current_value(tracker: &ChangeTracker) -> String {
    tracker
        .observe()
        .or_else(|| tracker.last_value())
        .unwrap_or_default()
}

/// `GET /timeupdating`
pub async fn time_page() -> Html<&'static str> {
    Html(TIME_PAGE)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.shutdown.is_shutting_down(),
        state.sessions.count(),
        state.tracker_scope,
        state.tracker.last_value(),
    ))
}

/// Any method other than GET on a known path.
pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method is not supported")
}

/// Unknown path.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found")
}

/// `GET /ws` — upgrade and start a push session.
///
/// Rejected upgrades are logged and answered with the rejection status.
/// While shutting down, or once the session limit is reached, the upgrade
/// is refused with 503.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(error = %rejection, "failed to upgrade connection");
            return rejection.into_response();
        }
    };

    if state.shutdown.is_shutting_down() {
        debug!("refusing upgrade during shutdown");
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let Some(guard) = state.sessions.try_register() else {
        warn!(
            capacity = state.sessions.capacity(),
            "connection limit reached, refusing upgrade"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let tracker = match state.tracker_scope {
        TrackerScope::PerSession => Arc::new(state.tracker.for_session()),
        TrackerScope::Shared => Arc::clone(&state.tracker),
    };
    let cancel = state.shutdown.token();
    let task = state.shutdown.track();
    let interval = state.push_interval;

    ws.on_failed_upgrade(|e| warn!(error = %e, "failed to upgrade connection"))
        .on_upgrade(move |socket| session::serve(socket, tracker, interval, cancel, guard, task))
}
