//! `SwatchServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use swatch_core::{ChangeTracker, TrackerScope, ValueSource};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::routes;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::SessionRegistry;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Tracker behind `/time`; also shared by push sessions in
    /// [`TrackerScope::Shared`] mode.
    pub tracker: Arc<ChangeTracker>,
    /// Live push sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Push session poll interval.
    pub push_interval: Duration,
    /// Push session tracker scope.
    pub tracker_scope: TrackerScope,
    /// When the server started.
    pub start_time: Instant,
}

/// The swatch server.
pub struct SwatchServer {
    config: ServerConfig,
    state: AppState,
}

impl SwatchServer {
    /// Create a server serving values from `source`.
    ///
    /// The server's tracker observes the source once here, so `/time` has a
    /// last-known value from the first request on. Fails if `config` does
    /// not pass [`ServerConfig::validate`].
    pub fn new(config: ServerConfig, source: Arc<dyn ValueSource>) -> Result<Self, ServerError> {
        config.validate()?;
        let tracker = ChangeTracker::new(source);
        let _ = tracker.observe();

        let state = AppState {
            tracker: Arc::new(tracker),
            sessions: Arc::new(SessionRegistry::new(config.max_connections)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            push_interval: config.push_interval(),
            tracker_scope: config.tracker_scope,
            start_time: Instant::now(),
        };
        Ok(Self { config, state })
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(routes::index).fallback(routes::method_not_allowed))
            .route("/time", get(routes::time).fallback(routes::method_not_allowed))
            .route("/timeupdating", get(routes::time_page).fallback(routes::method_not_allowed))
            .route("/health", get(routes::health))
            .route("/ws", get(routes::ws_upgrade))
            .fallback(routes::not_found)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address and the serving task, which resolves once
    /// shutdown has been initiated and in-flight HTTP requests are done.
    pub async fn listen(
        &self,
    ) -> Result<(SocketAddr, JoinHandle<Result<(), ServerError>>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            tracker_scope = %self.config.tracker_scope,
            push_interval_ms = self.config.push_interval_ms,
            max_connections = self.config.max_connections,
            "swatch server listening"
        );

        let router = self.router();
        let stop = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
                .map_err(ServerError::from)
        });

        Ok((local_addr, handle))
    }

    /// Cancel every push session and wait for them to close, bounded by the
    /// configured shutdown timeout. Returns `false` on timeout.
    pub async fn shutdown_gracefully(&self) -> bool {
        self.state
            .shutdown
            .graceful_shutdown(Some(self.config.shutdown_timeout()))
            .await
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the server's tracker.
    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.state.tracker
    }

    /// Get the session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.state.sessions
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use swatch_core::{BeatClock, BeatTime, ManualSource};
    use tower::ServiceExt;

    const VALUE: &str = "2026-10-19@512.3";

    fn make_server() -> (Arc<ManualSource>, SwatchServer) {
        let source = Arc::new(ManualSource::new(VALUE));
        let server = SwatchServer::new(ServerConfig::default(), source.clone()).unwrap();
        (source, server)
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, String, Option<String>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
    }

    #[test]
    fn tracker_primed_at_construction() {
        let (_source, server) = make_server();
        assert_eq!(server.tracker().last_value().as_deref(), Some(VALUE));
    }

    #[test]
    fn invalid_config_is_rejected() {
        for config in [
            ServerConfig {
                push_interval_ms: 0,
                ..ServerConfig::default()
            },
            ServerConfig {
                max_connections: 0,
                ..ServerConfig::default()
            },
        ] {
            let result = SwatchServer::new(config, Arc::new(ManualSource::new(VALUE)));
            assert!(matches!(result, Err(ServerError::InvalidConfig(_))));
        }
    }

    #[tokio::test]
    async fn index_says_hello() {
        let (_source, server) = make_server();
        let (status, body, ct) = call(server.router(), "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Hello world!");
        assert!(ct.unwrap().starts_with("text/plain"));
    }

    #[tokio::test]
    async fn time_returns_beat_time() {
        let server = SwatchServer::new(ServerConfig::default(), Arc::new(BeatClock)).unwrap();
        let (status, body, ct) = call(server.router(), "GET", "/time").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.unwrap().starts_with("text/plain"));
        assert!(!body.is_empty());
        assert!(body.parse::<BeatTime>().is_ok(), "bad body {body:?}");
    }

    #[tokio::test]
    async fn time_is_stable_while_source_unchanged() {
        let (_source, server) = make_server();
        let app = server.router();
        let (_, first, _) = call(app.clone(), "GET", "/time").await;
        let (_, second, _) = call(app, "GET", "/time").await;
        assert_eq!(first, VALUE);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn time_follows_source() {
        let (source, server) = make_server();
        source.set("2026-10-19@512.4");
        let (_, body, _) = call(server.router(), "GET", "/time").await;
        assert_eq!(body, "2026-10-19@512.4");
    }

    #[tokio::test]
    async fn post_time_is_method_not_allowed() {
        let (_source, server) = make_server();
        let (status, body, _) = call(server.router(), "POST", "/time").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, "Method is not supported");
    }

    #[tokio::test]
    async fn post_index_is_method_not_allowed() {
        let (_source, server) = make_server();
        let (status, _, _) = call(server.router(), "DELETE", "/").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (_source, server) = make_server();
        let (status, body, _) = call(server.router(), "GET", "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404 page not found");
    }

    #[tokio::test]
    async fn time_page_is_html() {
        let (_source, server) = make_server();
        let (status, body, ct) = call(server.router(), "GET", "/timeupdating").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.unwrap().starts_with("text/html"));
        assert!(body.contains("new WebSocket("));
    }

    #[tokio::test]
    async fn health_reports_state() {
        let (_source, server) = make_server();
        let (status, body, _) = call(server.router(), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["tracker_scope"], "per_session");
        assert_eq!(parsed["last_value"], VALUE);
    }

    #[tokio::test]
    async fn health_reports_shutdown() {
        let (_source, server) = make_server();
        server.shutdown().shutdown();
        let (_, body, _) = call(server.router(), "GET", "/health").await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["status"], "shutting_down");
    }

    #[tokio::test]
    async fn ws_without_upgrade_headers_is_rejected() {
        let (_source, server) = make_server();
        let (status, _, _) = call(server.router(), "GET", "/ws").await;
        assert!(status.is_client_error(), "got {status}");
        assert_eq!(server.sessions().count(), 0);
    }

    #[tokio::test]
    async fn listen_on_auto_port() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = SwatchServer::new(config, Arc::new(ManualSource::new(VALUE))).unwrap();
        let (addr, handle) = server.listen().await.unwrap();
        assert!(addr.port() > 0);

        assert!(server.shutdown_gracefully().await);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port,
            ..ServerConfig::default()
        };
        let server = SwatchServer::new(config, Arc::new(ManualSource::new(VALUE))).unwrap();
        let err = server.listen().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
