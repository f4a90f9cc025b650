//! The per-session poll-and-push loop.
//!
//! Each session owns both halves of its socket. On every tick it asks its
//! tracker for a changed value and writes it as one text frame. The loop
//! ends on the first write failure, when the peer closes, or when the
//! shutdown token fires; dropping the halves closes the socket.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use swatch_core::ChangeTracker;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{debug, info, trace, warn};

use super::registry::SessionGuard;

/// Upper bound on the close handshake at shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a push loop returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent a Close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    ReadFailed,
    /// Writing a frame failed.
    WriteFailed,
    /// Server shutdown.
    Cancelled,
}

/// Outcome of a push loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Why the loop ended.
    pub end: SessionEnd,
    /// Text frames successfully written.
    pub frames_sent: u64,
}

/// Run the poll-and-push loop until the peer leaves, a write fails, or
/// `cancel` fires.
///
/// The first tick fires immediately, so a fresh tracker delivers the current
/// value as soon as the session starts. Frames received from the client
/// are ignored apart from Close.
///
/// # Panics
///
/// Panics if `interval` is zero; [`crate::ServerConfig::validate`] rejects
/// such configs.
pub async fn run_push_loop<W, R, E>(
    mut sink: W,
    mut stream: R,
    tracker: &ChangeTracker,
    interval: Duration,
    cancel: CancellationToken,
) -> SessionSummary
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames_sent: u64 = 0;

    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                close_going_away(&mut sink).await;
                break SessionEnd::Cancelled;
            }
            // Ahead of reads so a client that never stops sending still
            // gets its pushes.
            _ = ticker.tick() => {
                let Some(value) = tracker.observe() else {
                    continue;
                };
                trace!(%value, "pushing value");
                // A write stuck on a dead peer must not hold up shutdown.
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break SessionEnd::Cancelled,
                    sent = sink.send(Message::Text(value.into())) => match sent {
                        Ok(()) => frames_sent += 1,
                        Err(e) => {
                            warn!(error = %e, "failed to write frame");
                            break SessionEnd::WriteFailed;
                        }
                    },
                }
            }
            incoming = stream.next() => match incoming {
                None | Some(Ok(Message::Close(_))) => break SessionEnd::PeerClosed,
                Some(Err(e)) => {
                    debug!(error = %e, "socket read failed");
                    break SessionEnd::ReadFailed;
                }
                Some(Ok(_)) => {}
            },
        }
    };

    SessionSummary { end, frames_sent }
}

/// Send a 1001 Close frame and flush, bounded by [`CLOSE_TIMEOUT`].
async fn close_going_away<W>(sink: &mut W)
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let frame = CloseFrame {
        code: close_code::AWAY,
        reason: Utf8Bytes::from_static("server shutting down"),
    };
    let close = async {
        sink.send(Message::Close(Some(frame))).await?;
        sink.close().await
    };
    match time::timeout(CLOSE_TIMEOUT, close).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "close handshake failed"),
        Err(_) => debug!("close handshake timed out"),
    }
}

/// Serve one upgraded connection until its push loop ends.
///
/// `guard` and `task` are held for the whole session so the registry count
/// and shutdown bookkeeping are released exactly when the socket is.
pub async fn serve(
    socket: WebSocket,
    tracker: Arc<ChangeTracker>,
    interval: Duration,
    cancel: CancellationToken,
    guard: SessionGuard,
    task: TaskTrackerToken,
) {
    let session_id = guard.id().clone();
    info!(session_id = %session_id, "push session connected");

    let (sink, stream) = socket.split();
    let summary = run_push_loop(sink, stream, &tracker, interval, cancel).await;

    info!(
        session_id = %session_id,
        end = ?summary.end,
        frames_sent = summary.frames_sent,
        connected_ms = u64::try_from(guard.age().as_millis()).unwrap_or(u64::MAX),
        "push session ended"
    );
    drop(guard);
    drop(task);
}
