//! # swatch-server
//!
//! Axum HTTP + `WebSocket` server for a single live value.
//!
//! - Pull endpoints: `/`, `/time`, `/timeupdating`, `/health`
//! - Push endpoint `/ws`: one poll-and-push loop per session, each writing
//!   a text frame only when its change tracker reports a new value
//! - Session registry with a connection limit
//! - Graceful shutdown via `CancellationToken` + `TaskTracker`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::{AppState, SwatchServer};
pub use shutdown::ShutdownCoordinator;
