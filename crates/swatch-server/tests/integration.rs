//! End-to-end tests against a real listener with WebSocket and HTTP clients.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use swatch_core::{ManualSource, TrackerScope, ValueSource};
use swatch_server::{ServerConfig, ServerError, SwatchServer};

const TIMEOUT: Duration = Duration::from_secs(5);
const INTERVAL_MS: u64 = 100;
const VALUE: &str = "2026-10-19@512.3";

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Counter(AtomicU64);

impl ValueSource for Counter {
    fn now(&self) -> String {
        format!("2026-10-19@{}.0", self.0.fetch_add(1, Ordering::SeqCst) % 1000)
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        push_interval_ms: INTERVAL_MS,
        shutdown_timeout_secs: 5,
        ..ServerConfig::default()
    }
}

/// Boot a server on an auto-assigned port.
async fn boot(
    config: ServerConfig,
    source: Arc<dyn ValueSource>,
) -> (SocketAddr, Arc<SwatchServer>, JoinHandle<Result<(), ServerError>>) {
    let server = Arc::new(SwatchServer::new(config, source).unwrap());
    let (addr, handle) = server.listen().await.unwrap();
    (addr, server, handle)
}

async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut WsStream) -> String {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(t))) => return t.as_str().to_string(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn every_session_gets_current_value_then_changes() {
    let source = Arc::new(ManualSource::new(VALUE));
    let (addr, server, _handle) = boot(test_config(), source.clone()).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    assert_eq!(next_text(&mut a).await, VALUE);
    assert_eq!(next_text(&mut b).await, VALUE);
    assert_eq!(server.sessions().count(), 2);

    source.set("2026-10-19@512.4");
    assert_eq!(next_text(&mut a).await, "2026-10-19@512.4");
    assert_eq!(next_text(&mut b).await, "2026-10-19@512.4");
}

#[tokio::test]
async fn unchanged_value_is_not_repeated() {
    let source = Arc::new(ManualSource::new(VALUE));
    let (addr, _server, _handle) = boot(test_config(), source).await;

    let mut ws = connect(addr).await;
    assert_eq!(next_text(&mut ws).await, VALUE);

    let quiet = timeout(Duration::from_millis(INTERVAL_MS * 4), ws.next()).await;
    assert!(quiet.is_err(), "unexpected frame: {quiet:?}");
}

#[tokio::test]
async fn shared_tracker_sessions_each_receive_frames() {
    let config = ServerConfig {
        tracker_scope: TrackerScope::Shared,
        ..test_config()
    };
    let (addr, _server, _handle) = boot(config, Arc::new(Counter(AtomicU64::new(0)))).await;

    let a = connect(addr).await;
    let b = connect(addr).await;

    let window = Duration::from_millis(INTERVAL_MS * 3);
    let count = move |mut ws: WsStream| async move {
        let mut frames = 0;
        let _ = timeout(window, async {
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() {
                    frames += 1;
                }
            }
        })
        .await;
        frames
    };
    let (frames_a, frames_b) = tokio::join!(count(a), count(b));
    assert!(frames_a >= 1, "session a got no frames");
    assert!(frames_b >= 1, "session b got no frames");
}

#[tokio::test]
async fn shutdown_closes_sessions_and_drains_registry() {
    let source = Arc::new(ManualSource::new(VALUE));
    let (addr, server, handle) = boot(test_config(), source).await;

    let mut ws = connect(addr).await;
    assert_eq!(next_text(&mut ws).await, VALUE);
    assert_eq!(server.sessions().count(), 1);

    assert!(server.shutdown_gracefully().await);

    let frame = timeout(TIMEOUT, ws.next()).await.unwrap();
    match frame {
        Some(Ok(Message::Close(Some(close)))) => assert_eq!(close.code, CloseCode::Away),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(server.sessions().count(), 0);
    assert_eq!(server.shutdown().active_tasks(), 0);

    timeout(TIMEOUT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn client_close_deregisters_session() {
    let source = Arc::new(ManualSource::new(VALUE));
    let (addr, server, _handle) = boot(test_config(), source).await;

    let mut ws = connect(addr).await;
    assert_eq!(next_text(&mut ws).await, VALUE);
    assert_eq!(server.sessions().count(), 1);

    ws.close(None).await.unwrap();
    let sessions = Arc::clone(server.sessions());
    wait_until(move || sessions.count() == 0).await;
}

#[tokio::test]
async fn dropped_client_deregisters_session() {
    let source = Arc::new(ManualSource::new(VALUE));
    let (addr, server, _handle) = boot(test_config(), source.clone()).await;

    let mut ws = connect(addr).await;
    assert_eq!(next_text(&mut ws).await, VALUE);
    drop(ws);

    let sessions = Arc::clone(server.sessions());
    wait_until(move || sessions.count() == 0).await;
}

#[tokio::test]
async fn connection_limit_refuses_with_503() {
    let config = ServerConfig {
        max_connections: 1,
        ..test_config()
    };
    let (addr, server, _handle) = boot(config, Arc::new(ManualSource::new(VALUE))).await;

    let mut first = connect(addr).await;
    assert_eq!(next_text(&mut first).await, VALUE);

    let err = connect_async(format!("ws://{addr}/ws")).await.unwrap_err();
    match err {
        WsError::Http(resp) => assert_eq!(resp.status().as_u16(), 503),
        other => panic!("expected HTTP 503, got {other:?}"),
    }
    assert_eq!(server.sessions().count(), 1);

    drop(first);
    let sessions = Arc::clone(server.sessions());
    wait_until(move || sessions.count() == 0).await;
    let mut again = connect(addr).await;
    assert_eq!(next_text(&mut again).await, VALUE);
}

#[tokio::test]
async fn upgrades_refused_while_shutting_down() {
    let server = SwatchServer::new(test_config(), Arc::new(ManualSource::new(VALUE))).unwrap();
    server.shutdown().shutdown();

    // `listen` stops accepting once shutdown begins, so serve the router directly.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(axum::serve(listener, server.router()).into_future());

    let err = connect_async(format!("ws://{addr}/ws")).await.unwrap_err();
    match err {
        WsError::Http(resp) => assert_eq!(resp.status().as_u16(), 503),
        other => panic!("expected HTTP 503, got {other:?}"),
    }
    assert_eq!(server.sessions().count(), 0);
    serving.abort();
}

#[tokio::test]
async fn pull_endpoints_over_http() {
    let source = Arc::new(ManualSource::new(VALUE));
    let (addr, _server, _handle) = boot(test_config(), source.clone()).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let hello = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(hello.status(), 200);
    assert_eq!(hello.text().await.unwrap(), "Hello world!");

    let first = client.get(format!("{base}/time")).send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), VALUE);
    let second = client.get(format!("{base}/time")).send().await.unwrap();
    assert_eq!(second.text().await.unwrap(), VALUE);

    source.set("2026-10-19@600.0");
    let changed = client.get(format!("{base}/time")).send().await.unwrap();
    assert_eq!(changed.text().await.unwrap(), "2026-10-19@600.0");

    let post = client.post(format!("{base}/time")).send().await.unwrap();
    assert_eq!(post.status(), 405);

    let missing = client.get(format!("{base}/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn bind_conflict_is_an_error() {
    let (addr, _server, _handle) = boot(test_config(), Arc::new(ManualSource::new(VALUE))).await;

    let config = ServerConfig {
        port: addr.port(),
        ..test_config()
    };
    let second = SwatchServer::new(config, Arc::new(ManualSource::new(VALUE))).unwrap();
    let err = second.listen().await.unwrap_err();
    assert!(matches!(err, ServerError::Bind { .. }), "got {err:?}");
}
